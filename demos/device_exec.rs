use std::env;
use std::process;

use fleetssh::config::EngineConfig;
use fleetssh::engine::{CommandEngine, ExecuteRequest, ProbeRequest, tool_descriptors};

fn print_usage() {
    eprintln!(
        "Usage: cargo run --example device_exec -- \
         <host> <username> <password> <brand> [command] [--config <path>] [--tools]"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "--tools") {
        for tool in tool_descriptors() {
            println!("{}", serde_json::to_string_pretty(&tool)?);
        }
        return Ok(());
    }

    let config = match args.iter().position(|a| a == "--config") {
        Some(idx) if idx + 1 < args.len() => {
            let path = args.remove(idx + 1);
            args.remove(idx);
            EngineConfig::from_json_file(path)?
        }
        Some(_) => {
            print_usage();
            process::exit(2);
        }
        None => EngineConfig::default(),
    };

    if args.len() < 4 {
        print_usage();
        process::exit(2);
    }
    let [host, username, password, brand] = [&args[0], &args[1], &args[2], &args[3]];
    let command = args.get(4).cloned().unwrap_or_default();

    let engine = CommandEngine::from_config(config);
    engine.registry().try_upsert(host, username, password, brand)?;
    println!("registered {host} as {brand}");

    let probe = engine.probe(ProbeRequest::new(host.as_str())).await;
    println!("probe ok={} kind={:?}\n{probe}", probe.ok, probe.error_kind);
    if !probe.ok {
        process::exit(1);
    }

    let request = ExecuteRequest::new(host.as_str(), command.replace("\\n", "\n"));
    let result = engine.execute(request).await;
    println!(
        "outcome={:?} kind={:?} exit_status={:?}",
        result.outcome, result.error_kind, result.exit_status
    );
    println!("{result}");
    Ok(())
}
