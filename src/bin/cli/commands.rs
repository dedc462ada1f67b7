use stomp_socket::{StompClient, StompError};

use super::state::SessionLog;

/// One line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum CliCommand<'a> {
    Send { destination: &'a str, body: &'a str },
    Subscribe(&'a str),
    Unsubscribe(&'a str),
    Begin(&'a str),
    Commit(&'a str),
    Abort(&'a str),
    Ack(&'a str),
    Summary,
    Report,
    Help,
    Quit,
    Empty,
}

/// Result of executing a command
pub enum CommandResult {
    /// Command executed successfully
    Ok,
    /// Command requests exit
    Quit,
    /// Something to show the user
    Info(String),
    /// Error executing command
    Error(String),
}

/// Parse a prompt line. Errors carry the usage text to print.
pub fn parse(line: &str) -> Result<CliCommand<'_>, String> {
    let line = line.trim();
    let mut parts = line.splitn(3, ' ');
    let Some(verb) = parts.next().filter(|v| !v.is_empty()) else {
        return Ok(CliCommand::Empty);
    };
    let arg = parts.next();
    let rest = parts.next();

    let need = |usage: &str| arg.ok_or_else(|| format!("Usage: {}", usage));
    Ok(match verb {
        "quit" | "exit" | "q" => CliCommand::Quit,
        "send" => match (arg, rest) {
            (Some(destination), Some(body)) => CliCommand::Send { destination, body },
            _ => return Err("Usage: send <destination> <message>".to_string()),
        },
        "sub" | "subscribe" => CliCommand::Subscribe(need("sub <destination>")?),
        "unsub" | "unsubscribe" => CliCommand::Unsubscribe(need("unsub <destination>")?),
        "begin" => CliCommand::Begin(need("begin <transaction>")?),
        "commit" => CliCommand::Commit(need("commit <transaction>")?),
        "abort" => CliCommand::Abort(need("abort <transaction>")?),
        "ack" => CliCommand::Ack(need("ack <message-id>")?),
        "summary" => CliCommand::Summary,
        "report" => CliCommand::Report,
        "help" | "?" => CliCommand::Help,
        other => return Err(format!("Unknown command: {}. Type 'help' for commands.", other)),
    })
}

/// Parse and execute a command
pub fn execute_command(line: &str, client: &StompClient, log: &mut SessionLog) -> CommandResult {
    let command = match parse(line) {
        Ok(command) => command,
        Err(usage) => return CommandResult::Error(usage),
    };

    let outcome: Result<(), StompError> = match command {
        CliCommand::Empty => Ok(()),
        CliCommand::Quit => return CommandResult::Quit,
        CliCommand::Help => {
            print_help();
            Ok(())
        }
        CliCommand::Summary => return CommandResult::Info(log.summary()),
        CliCommand::Report => return CommandResult::Info(log.report(true, 80)),
        CliCommand::Send { destination, body } => client.send(body, destination, None, None),
        CliCommand::Subscribe(destination) => client.subscribe(destination).map(|()| {
            log.register_subscription(destination);
        }),
        CliCommand::Unsubscribe(destination) => client.unsubscribe(destination).map(|()| {
            log.forget_subscription(destination);
        }),
        CliCommand::Begin(tx) => client.begin(tx),
        CliCommand::Commit(tx) => client.commit(tx),
        CliCommand::Abort(tx) => client.abort(tx),
        CliCommand::Ack(id) => client.ack(id),
    };

    match outcome {
        Ok(()) => CommandResult::Ok,
        Err(e) => CommandResult::Error(format!("Command failed: {}", e)),
    }
}

/// Print help text
pub fn print_help() {
    println!("Commands:");
    println!("  send <destination> <message>  - Send a message");
    println!("  sub <destination>             - Subscribe to a destination");
    println!("  unsub <destination>           - Drop a subscription");
    println!("  begin|commit|abort <tx>       - Transaction control");
    println!("  ack <message-id>              - Acknowledge a message");
    println!("  summary                       - Print session summary");
    println!("  report                        - Summary with message history");
    println!("  quit                          - Exit");
}
