//! Courier - headless front end for the request pipeline
//!
//! Usage: `courier [--config PATH] [--env NAME] <request id or name>`
//!
//! HTTP requests print their response. Socket requests print the message log
//! and send each stdin line as a message; EOF disconnects.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use courier::constants::{APP_NAME, APP_VERSION, DEFAULT_LOG_FILE};
use courier::{
    AppActor, AppEvent, Config, Error, MessageKind, NetworkActor, NetworkCommand, NetworkResponse,
    ProxyClient, RemoteStore, RequestType, Response, Snapshot, Workspace,
};

struct Args {
    config: Option<PathBuf>,
    environment: Option<String>,
    request: String,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut config = None;
    let mut environment = None;
    let mut request = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(args.next().context("--config needs a path")?)),
            "--env" => environment = Some(args.next().context("--env needs a name")?),
            "--version" => {
                println!("{} {}", APP_NAME, APP_VERSION);
                std::process::exit(0);
            }
            other if other.starts_with("--") => bail!("unknown option {}", other),
            other => request = Some(other.to_string()),
        }
    }

    Ok(Args {
        config,
        environment,
        request: request.context("usage: courier [--config PATH] [--env NAME] <request>")?,
    })
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_file(&Config::default_path())?,
    };
    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    let config = load_config(args.config.as_deref())?;

    // Initialize logging to file
    let log_dir = config
        .log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let log_name = config
        .log_file
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| DEFAULT_LOG_FILE.into());
    let file_appender = tracing_appender::rolling::never(log_dir, log_name);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("courier=info")))
        .init();

    let store = RemoteStore::from_config(&config);
    let mut workspace = Workspace::load(&store)
        .await
        .context("loading workspace")?;

    if let Some(env) = &args.environment {
        if !workspace.set_active_environment(Some(env)) {
            bail!("unknown environment '{}'", env);
        }
    }

    let request = workspace
        .find_request_by_name_or_id(&args.request)
        .cloned()
        .ok_or_else(|| Error::RequestNotFound {
            id: args.request.clone(),
        })?;

    // Create channels
    let (event_tx, event_rx) = mpsc::unbounded_channel::<AppEvent>();
    let (net_cmd_tx, net_cmd_rx) = mpsc::unbounded_channel::<NetworkCommand>();
    let (net_resp_tx, net_resp_rx) = mpsc::unbounded_channel::<NetworkResponse>();
    let (snapshot_tx, mut snapshot_rx) = mpsc::unbounded_channel::<Snapshot>();

    // Spawn network actor
    let network_actor = NetworkActor::new(ProxyClient::from_config(&config), net_resp_tx);
    let network = tokio::spawn(network_actor.run(net_cmd_rx));

    // Spawn app actor
    let app_actor = AppActor::new(workspace, &config, net_cmd_tx, snapshot_tx).with_store(store);
    let app = tokio::spawn(app_actor.run(event_rx, net_resp_rx));

    let _ = event_tx.send(AppEvent::Select(request.id.clone()));
    let _ = event_tx.send(AppEvent::Send);

    match request.kind {
        RequestType::Http => {
            while let Some(snapshot) = snapshot_rx.recv().await {
                if let (Some(response), false) = (&snapshot.response, snapshot.loading) {
                    print_response(response);
                    break;
                }
            }
        }
        RequestType::WebSocket | RequestType::SocketIo => {
            // Interactive stdin gets its own thread so shutdown never waits on a read
            let input_tx = event_tx.clone();
            std::thread::spawn(move || {
                for line in std::io::stdin().lock().lines().map_while(Result::ok) {
                    let _ = input_tx.send(AppEvent::SendMessage(line));
                }
                let _ = input_tx.send(AppEvent::Disconnect);
            });

            let mut printed = 0;
            loop {
                tokio::select! {
                    snapshot = snapshot_rx.recv() => {
                        let Some(snapshot) = snapshot else { break };
                        for message in snapshot.messages.iter().skip(printed) {
                            let marker = match message.kind {
                                MessageKind::Sent => ">>",
                                MessageKind::Received => "<<",
                                MessageKind::Info => "--",
                                MessageKind::Error => "!!",
                                MessageKind::Success => "++",
                            };
                            println!("{} [{}] {}", marker, message.time.format("%H:%M:%S"), message.text);
                        }
                        printed = printed.max(snapshot.messages.len());
                        if !snapshot.live && printed > 0 {
                            break;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    let _ = event_tx.send(AppEvent::Quit);
    let _ = app.await;
    let _ = network.await;
    Ok(())
}

fn print_response(response: &Response) {
    if let Some(error) = &response.error {
        println!("Error: {}", error);
        return;
    }
    if let Some(status) = response.status {
        println!("{} {}", status, response.status_text);
    }
    println!("{} ms, {} bytes", response.time, response.size);
    let mut headers: Vec<_> = response.headers.iter().collect();
    headers.sort();
    for (key, value) in headers {
        println!("{}: {}", key, value);
    }
    println!();
    let body = match &response.data {
        serde_json::Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    println!("{}", body);
}
