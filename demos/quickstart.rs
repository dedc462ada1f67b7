use std::time::Duration;

use stomp_socket::{ConnectRequest, Headers, StompClient, StompEvent, WebSocketTransport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Expects a broker with STOMP over WebSocket on localhost:15674
    // (RabbitMQ with the web_stomp plugin, for instance).

    let client = StompClient::new(WebSocketTransport::new);
    let mut events = client.events();

    let login = Headers::new().with("login", "guest").with("passcode", "guest");
    client.open(ConnectRequest::new("ws://127.0.0.1:15674/ws"), Some(login))?;

    loop {
        match tokio::time::timeout(Duration::from_secs(5), events.recv()).await {
            Ok(Some(StompEvent::Connected { session_id })) => {
                println!("connected, session {:?}", session_id);
                break;
            }
            Ok(Some(StompEvent::Error { description, .. })) => return Err(description.into()),
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => return Err("no CONNECTED from broker".into()),
        }
    }

    client.subscribe("/queue/test")?;
    client.send("hello from stomp-socket", "/queue/test", None, Some("r-1"))?;

    // Wait for our own message to come back, but don't block forever.
    let deadline = tokio::time::sleep(Duration::from_secs(5));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => {
                println!("timed out waiting for a message");
                break;
            }
            event = events.recv() => match event {
                Some(StompEvent::Receipt { receipt_id }) => println!("broker confirmed {}", receipt_id),
                Some(StompEvent::Message { destination, body, .. }) => {
                    println!("[{}] {}", destination, body.unwrap_or_default());
                    break;
                }
                Some(other) => println!("event: {:?}", other),
                None => break,
            },
        }
    }

    client.disconnect()?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok(())
}
