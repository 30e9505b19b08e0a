use les_rpc::Core::{LesError, Result};
use les_rpc::Debug::TableDebug;
use les_rpc::Network::{ConnectionState, EngineBuilder, EngineConfig};
use les_rpc::Registry::{Declarations, FunctionDecl};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let keep_alive = Arc::new(AtomicBool::new(true));
    let k = keep_alive.clone();
    ctrlc::set_handler(move || {
        k.store(false, Ordering::SeqCst);
    })
    .map_err(|err| LesError::Protocol(format!("failed to set ctrl-c handler: {err}")))?;

    let declarations = Declarations::with_builtin_types().with_function(
        FunctionDecl::new("jakeInit", "void")
            .input("int", "a")
            .input("short", "b")
            .output("float*", "r"),
    );
    let mut engine = EngineBuilder::new()
        .with_config(EngineConfig::from_env()?)
        .with_declarations(declarations)
        .build()?;

    info!("Client: connecting");
    while keep_alive.load(Ordering::SeqCst) {
        match engine.tick() {
            Ok(ConnectionState::Ready) => break,
            Ok(_) => std::thread::sleep(Duration::from_millis(10)),
            Err(err) => {
                error!("Client: {err}");
                return Err(err);
            }
        }
    }
    if engine.state() != ConnectionState::Ready {
        info!("Client: interrupted before the connection was ready");
        return Ok(());
    }

    TableDebug::log_types(engine.registry());
    TableDebug::log_structs(engine.registry());
    TableDebug::log_functions(engine.registry());

    let r = 0.0f32;
    let call = {
        let mut builder = engine.start_call("jakeInit", "void")?;
        builder.add_input("a", 666i32)?.add_input("b", 123i16)?.add_output("r", &r)?;
        builder.finish()?
    };
    engine.send_call(1, &call)?;
    engine.send_test(2, "hello from the client")?;
    info!("Client: sent {} ({} bytes)", call.function_name, call.bytes.len());

    // a few more ticks so the queued messages go out
    for _ in 0..5 {
        engine.tick()?;
    }
    while keep_alive.load(Ordering::SeqCst) && engine.queues().pending_sends() > 0 {
        engine.tick()?;
    }

    engine.shutdown();
    info!("Client: done");
    Ok(())
}
