use super::parameter::ParameterData;
use crate::Core::LesError;
use crate::Definition::{FunctionDefinition, ParamMode, TypeEntry, TypeFlags};
use crate::Registry::builtin::scalar_kind;
use crate::Registry::lookup::MAX_NESTING_DEPTH;
use crate::Registry::SymbolLookup;
use tracing::{info, warn};

/// Result of rendering a parameter buffer: one line per leaf value, plus any
/// problems met on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeReport {
    pub lines: Vec<String>,
    pub errors: Vec<String>,
}

impl DecodeReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn push_line(&mut self, depth: usize, line: String) {
        let line = format!("{:indent$}{line}", "", indent = depth * 2);
        info!("{line}");
        self.lines.push(line);
    }

    fn push_error(&mut self, error: String) {
        warn!("decode: {error}");
        self.errors.push(error);
    }
}

/// Walks every parameter of `function`, rendering the inputs found in `data`.
///
/// Arrays expand element by element and structs member by member. Output slots
/// are stepped over without being read. An unresolvable type is reported and the walk stops,
/// since the position of anything after it in the buffer is unknown.
pub fn decode_for_display<L: SymbolLookup + ?Sized>(
    lookup: &L,
    function: &FunctionDefinition,
    data: &mut ParameterData,
) -> DecodeReport {
    let mut report = DecodeReport::default();
    let function_name = lookup.name_of(function.name_id);
    info!("decoding call {function_name} ({} bytes)", data.num_bytes_written());

    for param in function.params() {
        let param_name = lookup.name_of(param.name_id);
        let type_name = lookup.name_of(param.type_id);
        let ty = match lookup.type_by_string_id(param.type_id) {
            Ok(ty) => ty,
            Err(err) => {
                report.push_error(format!("parameter '{param_name}': {err}"));
                break;
            }
        };
        let outcome = match param.mode {
            ParamMode::Input => render(lookup, &ty, &type_name, &param_name, data, 0, &mut report),
            // filled in by the callee; step over the slot
            ParamMode::Output => lookup.compute_storage_size(&ty).and_then(|size| {
                data.take(size as usize)?;
                report.push_line(0, format!("{type_name} {param_name} = <output>"));
                Ok(())
            }),
        };
        if let Err(err) = outcome {
            report.push_error(format!("parameter '{param_name}': {err}"));
            break;
        }
    }
    if data.remaining() != 0 {
        report.push_error(format!("{} bytes left unread", data.remaining()));
    }
    report
}

fn render<L: SymbolLookup + ?Sized>(
    lookup: &L,
    ty: &TypeEntry,
    type_name: &str,
    label: &str,
    data: &mut ParameterData,
    depth: usize,
    report: &mut DecodeReport,
) -> Result<(), LesError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(LesError::Decode(format!("'{label}' nests too deeply")));
    }
    if ty.is_array() {
        let element = lookup.resolve_root(ty)?;
        let element_name = lookup.name_of(ty.aliased_type_id);
        report.push_line(depth, format!("{type_name} {label}"));
        for i in 0..ty.num_elements {
            render_item(lookup, &element, &element_name, &format!("{label}[{i}]"), data, depth + 1, report)?;
        }
        return Ok(());
    }
    render_item(lookup, ty, type_name, label, data, depth, report)
}

fn render_item<L: SymbolLookup + ?Sized>(
    lookup: &L,
    ty: &TypeEntry,
    type_name: &str,
    label: &str,
    data: &mut ParameterData,
    depth: usize,
    report: &mut DecodeReport,
) -> Result<(), LesError> {
    let root = lookup.resolve_root(ty)?;
    if root.flags.contains(TypeFlags::STRUCT) {
        let definition = lookup
            .struct_by_hash(root.hash)
            .ok_or_else(|| LesError::SymbolNotFound(format!("struct definition for '{type_name}'")))?;
        report.push_line(depth, format!("{type_name} {label}"));
        for member in &definition.members {
            let member_type = lookup.type_by_string_id(member.type_id)?;
            let member_type_name = lookup.name_of(member.type_id);
            let member_label = format!("{label}.{}", lookup.name_of(member.name_id));
            render(lookup, &member_type, &member_type_name, &member_label, data, depth + 1, report)?;
        }
        return Ok(());
    }

    let value = data.read(lookup, &root)?;
    let bytes = value.pod_bytes().unwrap_or_default();
    let shown = scalar_kind(root.hash)
        .and_then(|kind| kind.render(bytes))
        .unwrap_or_else(|| format!("0x{}", hex::encode(bytes)));
    report.push_line(depth, format!("{type_name} {label} = {shown}"));
    Ok(())
}
