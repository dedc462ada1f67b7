use std::io::{self, Write};
use std::time::Duration;

use stomp_socket::{
    ClientConfig, ConnectRequest, EventStream, Headers, HeartbeatConfig, ReconnectPolicy, StompClient,
    StompError, StompEvent, WebSocketTransport,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::args::Cli;
use super::commands::{CommandResult, execute_command, print_help};
use super::exit_codes;
use super::state::SessionLog;

/// How long the handshake may take before giving up.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Run the CLI in plain line mode
pub async fn run(cli: &Cli) -> Result<(), (String, u8)> {
    let heartbeat = match cli.heartbeat {
        0 => HeartbeatConfig::disabled(),
        secs => HeartbeatConfig::new().with_interval(Duration::from_secs(secs)),
    };
    let client = StompClient::with_config(
        WebSocketTransport::new,
        ClientConfig::new().with_heartbeat(heartbeat),
    );
    let mut events = client.events();
    // 0 means no reconnect, like --heartbeat 0
    let reconnect = cli.reconnect.filter(|secs| *secs > 0);

    let request = ConnectRequest::new(cli.url.clone());
    let connection_headers = connect_headers(cli);

    println!("Connecting to {}...", cli.url);
    client
        .open(request.clone(), Some(connection_headers.clone()))
        .map_err(closed)?;
    wait_for_session(&client, &mut events, &cli.url).await?;
    println!("Connected.");

    let mut log = SessionLog::new(&cli.url, &cli.login);
    log.sessions = 1;

    if let Some(secs) = reconnect {
        let policy = ReconnectPolicy::new().with_interval(Duration::from_secs(secs));
        client
            .reconnect(request, connection_headers, policy)
            .map_err(closed)?;
    }

    for dest in &cli.subscribe {
        client.subscribe(dest).map_err(closed)?;
        log.register_subscription(dest);
        println!("Subscribed to: {}", dest);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!();
    print_help();
    println!();
    prompt();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                match execute_command(&line, &client, &mut log) {
                    CommandResult::Ok => {}
                    CommandResult::Quit => break,
                    CommandResult::Info(msg) => println!("{}", msg),
                    CommandResult::Error(msg) => eprintln!("{}", msg),
                }
                prompt();
            }
            event = events.recv() => {
                let Some(event) = event else {
                    return Err(("Session ended unexpectedly".to_string(), exit_codes::PROTOCOL_ERROR));
                };
                handle_event(event, &client, &mut log, reconnect.is_some())?;
                prompt();
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    println!("Disconnecting...");
    let _ = client.stop_reconnect();
    if client.disconnect().is_ok() {
        let _ = tokio::time::timeout(Duration::from_secs(2), wait_for_disconnected(&mut events)).await;
        // give the socket task a moment to write DISCONNECT and the close frame
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    if cli.summary {
        println!("{}", log.summary());
    }
    Ok(())
}

fn connect_headers(cli: &Cli) -> Headers {
    let mut headers = Headers::new()
        .with("login", cli.login.as_str())
        .with("passcode", cli.passcode.as_str());
    if let Some(vhost) = &cli.vhost {
        headers.insert("host", vhost.as_str());
    }
    headers
}

/// Wait for CONNECTED, mapping early failures to exit codes.
async fn wait_for_session(
    client: &StompClient,
    events: &mut EventStream,
    url: &str,
) -> Result<(), (String, u8)> {
    let handshake = async {
        loop {
            match events.recv().await {
                Some(StompEvent::Connected { .. }) => return Ok(()),
                Some(StompEvent::Error {
                    description,
                    detail,
                }) => {
                    // an ERROR frame arrives over a live transport
                    let code = if client.is_connected() {
                        exit_codes::AUTH_ERROR
                    } else {
                        exit_codes::NETWORK_ERROR
                    };
                    let mut message = format!("Connection failed: {}", description);
                    if let Some(detail) = detail.filter(|d| !d.is_empty()) {
                        message.push_str(&format!(" ({})", detail.trim()));
                    }
                    return Err((message, code));
                }
                Some(StompEvent::Disconnected) => {
                    return Err((
                        format!("Connection closed during handshake: {}", url),
                        exit_codes::NETWORK_ERROR,
                    ));
                }
                Some(_) => {}
                None => {
                    return Err((
                        "Session ended unexpectedly".to_string(),
                        exit_codes::PROTOCOL_ERROR,
                    ));
                }
            }
        }
    };

    tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake)
        .await
        .unwrap_or_else(|_| {
            Err((
                format!("Connection timed out: {}", url),
                exit_codes::NETWORK_ERROR,
            ))
        })
}

async fn wait_for_disconnected(events: &mut EventStream) {
    while let Some(event) = events.recv().await {
        if event == StompEvent::Disconnected {
            break;
        }
    }
}

fn handle_event(
    event: StompEvent,
    client: &StompClient,
    log: &mut SessionLog,
    reconnecting: bool,
) -> Result<(), (String, u8)> {
    match event {
        StompEvent::Connected { session_id } => {
            log.sessions += 1;
            println!("\nReconnected (session {}).", session_id.as_deref().unwrap_or("-"));
            // a new session starts without subscriptions
            for dest in log.subscriptions.keys() {
                client.subscribe(dest).map_err(closed)?;
                println!("Resubscribed to: {}", dest);
            }
        }
        StompEvent::Disconnected => {
            if !reconnecting {
                return Err(("Connection closed".to_string(), exit_codes::NETWORK_ERROR));
            }
            println!("\nDisconnected, waiting to reconnect...");
        }
        StompEvent::Message {
            body,
            headers,
            destination,
        } => {
            println!("\n[{}] MESSAGE received:", destination);
            for (k, v) in headers.iter() {
                println!("  {}: {}", k, v);
            }
            let body = body.unwrap_or_default();
            if !body.is_empty() {
                println!("  Body: {}", body);
            }
            log.record_message(&destination, body);
        }
        StompEvent::Receipt { receipt_id } => {
            log.receipts += 1;
            println!("\nReceipt: {}", receipt_id);
        }
        StompEvent::Error {
            description,
            detail,
        } => {
            log.errors += 1;
            match detail {
                Some(detail) if !detail.is_empty() => {
                    eprintln!("\n[ERROR] {}: {}", description, detail.trim())
                }
                _ => eprintln!("\n[ERROR] {}", description),
            }
        }
        StompEvent::SentPing => log.pings_sent += 1,
    }
    Ok(())
}

fn closed(e: StompError) -> (String, u8) {
    (format!("Client error: {}", e), exit_codes::PROTOCOL_ERROR)
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}
