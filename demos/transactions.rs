use std::time::Duration;

use stomp_socket::{ConnectRequest, Headers, StompClient, StompEvent, WebSocketTransport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Expects a broker with STOMP over WebSocket on localhost:15674.

    let client = StompClient::new(WebSocketTransport::new);
    let mut events = client.events();

    let login = Headers::new().with("login", "guest").with("passcode", "guest");
    client.open(ConnectRequest::new("ws://127.0.0.1:15674/ws"), Some(login))?;
    match tokio::time::timeout(Duration::from_secs(5), events.recv()).await {
        Ok(Some(StompEvent::Connected { .. })) => {}
        other => return Err(format!("handshake failed: {:?}", other).into()),
    }

    // Both messages are delivered together on commit
    let tx_id = "tx-example-1";
    client.begin(tx_id)?;
    println!("Transaction {} started", tx_id);

    let in_tx = Headers::new().with("transaction", tx_id);
    client.send("message 1 in transaction", "/queue/test", Some(in_tx.clone()), None)?;
    client.send("message 2 in transaction", "/queue/test", Some(in_tx), None)?;
    println!("Sent two messages in transaction");

    client.commit(tx_id)?;
    println!("Transaction {} committed", tx_id);

    // Nothing sent under an aborted transaction is delivered
    let tx_id_2 = "tx-example-2";
    client.begin(tx_id_2)?;
    println!("\nTransaction {} started", tx_id_2);

    let in_tx = Headers::new().with("transaction", tx_id_2);
    client.send("this message will be aborted", "/queue/test", Some(in_tx), None)?;
    println!("Sent message in transaction {} (will be aborted)", tx_id_2);

    client.abort(tx_id_2)?;
    println!("Transaction {} aborted", tx_id_2);

    client.disconnect()?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok(())
}
