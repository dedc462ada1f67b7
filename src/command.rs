use std::fmt;
use std::str::FromStr;

/// Client frame commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Send,
    Subscribe,
    Unsubscribe,
    Begin,
    Commit,
    Abort,
    Ack,
    Disconnect,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Ack => "ACK",
            Command::Disconnect => "DISCONNECT",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Command> for String {
    fn from(command: Command) -> Self {
        command.as_str().to_string()
    }
}

/// Broker frame commands the client understands.
///
/// Anything else on the command line of an inbound payload is not a frame
/// as far as this client is concerned and gets dropped by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCommand {
    Connected,
    Message,
    Receipt,
    Error,
}

impl ResponseCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseCommand::Connected => "CONNECTED",
            ResponseCommand::Message => "MESSAGE",
            ResponseCommand::Receipt => "RECEIPT",
            ResponseCommand::Error => "ERROR",
        }
    }
}

impl FromStr for ResponseCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECTED" => Ok(ResponseCommand::Connected),
            "MESSAGE" => Ok(ResponseCommand::Message),
            "RECEIPT" => Ok(ResponseCommand::Receipt),
            "ERROR" => Ok(ResponseCommand::Error),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for ResponseCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ResponseCommand> for String {
    fn from(command: ResponseCommand) -> Self {
        command.as_str().to_string()
    }
}

/// Returned when a command line is not one of the [`ResponseCommand`]s.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown response command: {0:?}")]
pub struct UnknownCommand(pub String);

/// Subscription acknowledgement modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    #[default]
    Auto,
    Client,
    ClientIndividual,
}

impl AckMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckMode::Auto => "auto",
            AckMode::Client => "client",
            AckMode::ClientIndividual => "client-individual",
        }
    }
}

impl fmt::Display for AckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_commands_parse_exactly() {
        assert_eq!("CONNECTED".parse(), Ok(ResponseCommand::Connected));
        assert_eq!("MESSAGE".parse(), Ok(ResponseCommand::Message));
        assert_eq!("RECEIPT".parse(), Ok(ResponseCommand::Receipt));
        assert_eq!("ERROR".parse(), Ok(ResponseCommand::Error));
        assert!("message".parse::<ResponseCommand>().is_err());
        assert!("SEND".parse::<ResponseCommand>().is_err());
        assert!("".parse::<ResponseCommand>().is_err());
    }

    #[test]
    fn client_commands_render_upper_case() {
        assert_eq!(Command::Unsubscribe.to_string(), "UNSUBSCRIBE");
        assert_eq!(String::from(Command::Disconnect), "DISCONNECT");
    }
}
