use super::parameter::ParameterData;
use super::value::WireScalar;
use crate::Core::{hash_case_sensitive, Hash, LesError, Result};
use crate::Definition::{FunctionDefinition, FunctionParameter, ParamMode};
use crate::Registry::SymbolLookup;
use tracing::debug;

/// A fully marshaled call, ready to be framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBuffer {
    pub function_hash: Hash,
    pub function_name: String,
    pub bytes: Vec<u8>,
}

/// Builds the parameter buffer for one call.
///
/// Parameters must be added in declaration order: inputs first, then outputs.
/// Every add is checked against the function definition (position, mode, name,
/// and optionally the caller's idea of the type) before any bytes are written,
/// and [`finish`](CallBuilder::finish) refuses a buffer whose size differs from
/// the declared `parameter_data_size`.
pub struct CallBuilder<'r, L: SymbolLookup + ?Sized> {
    lookup: &'r L,
    name: String,
    function: FunctionDefinition,
    data: ParameterData,
    used: Vec<bool>,
    next_index: usize,
    next_input: usize,
    next_output: usize,
}

impl<'r, L: SymbolLookup + ?Sized> CallBuilder<'r, L> {
    /// Looks up `name` and checks the caller's return type against the definition.
    pub fn start(lookup: &'r L, name: &str, return_type: &str) -> Result<Self> {
        let hash = hash_case_sensitive(name);
        let function = lookup
            .function_by_hash(hash)
            .ok_or_else(|| LesError::SymbolNotFound(format!("function '{name}'")))?
            .into_owned();
        let defined_name = lookup.name_of(function.name_id);
        if defined_name != name {
            return Err(LesError::SymbolNotFound(format!(
                "function '{name}' (hash matches '{defined_name}')"
            )));
        }

        let defined_return = lookup
            .string_by_id(function.return_type_id)
            .ok_or_else(|| LesError::SymbolNotFound(format!("return type of '{name}'")))?;
        if defined_return.hash != hash_case_sensitive(return_type) || defined_return.text != return_type {
            return Err(LesError::mismatch(
                name,
                format!("return type '{return_type}' but defined as '{}'", defined_return.text),
            ));
        }

        let num_params = function.num_params();
        Ok(Self {
            lookup,
            name: name.to_string(),
            data: ParameterData::with_capacity(function.parameter_data_size as usize),
            function,
            used: vec![false; num_params],
            next_index: 0,
            next_input: 0,
            next_output: 0,
        })
    }

    pub fn add_input<T: WireScalar>(&mut self, name: &str, value: T) -> Result<&mut Self> {
        self.add(ParamMode::Input, None, name, &value)
    }

    /// Like [`add_input`](Self::add_input), also checking the declared type text.
    pub fn add_input_as<T: WireScalar>(&mut self, type_name: &str, name: &str, value: T) -> Result<&mut Self> {
        self.add(ParamMode::Input, Some(type_name), name, &value)
    }

    /// Reserves an output parameter. The slot's current contents fill its wire
    /// space; the callee produces the real value.
    pub fn add_output<T: WireScalar>(&mut self, name: &str, slot: &T) -> Result<&mut Self> {
        self.add(ParamMode::Output, None, name, slot)
    }

    pub fn add_output_as<T: WireScalar>(&mut self, type_name: &str, name: &str, slot: &T) -> Result<&mut Self> {
        self.add(ParamMode::Output, Some(type_name), name, slot)
    }

    fn add<T: WireScalar>(
        &mut self,
        mode: ParamMode,
        type_name: Option<&str>,
        param_name: &str,
        value: &T,
    ) -> Result<&mut Self> {
        let param = self.expect_param(mode, type_name, param_name)?;
        let ty = self.lookup.type_by_string_id(param.type_id)?;
        self.data
            .write(self.lookup, &ty, &value.to_value(), mode)
            .map_err(|err| LesError::mismatch(&self.name, format!("parameter '{param_name}': {err}")))?;

        self.used[param.index as usize] = true;
        self.next_index += 1;
        match mode {
            ParamMode::Input => self.next_input += 1,
            ParamMode::Output => self.next_output += 1,
        }
        Ok(self)
    }

    fn expect_param(&self, mode: ParamMode, type_name: Option<&str>, param_name: &str) -> Result<FunctionParameter> {
        let name = &self.name;
        let (slot, declared) = match mode {
            ParamMode::Input => (self.next_input, &self.function.inputs),
            ParamMode::Output => (self.next_output, &self.function.outputs),
        };
        if slot >= declared.len() {
            return Err(LesError::mismatch(
                name,
                format!("too many {mode} parameters: '{param_name}' would be #{slot} of {}", declared.len()),
            ));
        }

        let hash = hash_case_sensitive(param_name);
        let param = *self
            .function
            .param_by_hash(hash)
            .ok_or_else(|| LesError::mismatch(name, format!("no parameter named '{param_name}'")))?;
        let index = param.index as usize;
        if self.used.get(index).copied().unwrap_or(true) {
            return Err(LesError::mismatch(name, format!("parameter '{param_name}' already set")));
        }
        if param.mode != mode {
            return Err(LesError::mismatch(
                name,
                format!("parameter '{param_name}' is {} but was added as {mode}", param.mode),
            ));
        }
        if index != self.next_index {
            return Err(LesError::mismatch(
                name,
                format!("parameter '{param_name}' is #{index} but #{} was expected next", self.next_index),
            ));
        }

        let defined_name = self.lookup.name_of(param.name_id);
        if defined_name != param_name {
            return Err(LesError::mismatch(
                name,
                format!("parameter '{param_name}' hash matches '{defined_name}'"),
            ));
        }
        if let Some(type_name) = type_name {
            let defined_type = self
                .lookup
                .string_by_id(param.type_id)
                .ok_or_else(|| LesError::SymbolNotFound(format!("type of parameter '{param_name}'")))?;
            if defined_type.hash != hash_case_sensitive(type_name) || defined_type.text != type_name {
                return Err(LesError::mismatch(
                    name,
                    format!("parameter '{param_name}' added as '{type_name}' but defined as '{}'", defined_type.text),
                ));
            }
        }
        Ok(param)
    }

    pub fn function(&self) -> &FunctionDefinition {
        &self.function
    }

    /// Completes the call once every parameter is set and the byte count matches.
    pub fn finish(self) -> Result<ParameterBuffer> {
        if let Some(missing) = self.used.iter().position(|used| !used) {
            let missing = self
                .function
                .param_by_index(missing)
                .map(|p| self.lookup.name_of(p.name_id))
                .unwrap_or_default();
            return Err(LesError::mismatch(&self.name, format!("parameter '{missing}' not set")));
        }
        let written = self.data.num_bytes_written();
        let declared = self.function.parameter_data_size as usize;
        if written != declared {
            return Err(LesError::mismatch(
                &self.name,
                format!("wrote {written} bytes but parameter data size is {declared}"),
            ));
        }
        debug!(function = %self.name, bytes = written, "call marshaled");
        Ok(ParameterBuffer {
            function_hash: hash_case_sensitive(&self.name),
            function_name: self.name,
            bytes: self.data.into_bytes(),
        })
    }
}
