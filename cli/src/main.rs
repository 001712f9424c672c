//! Command line client for the tickmatch engine.
//!
//! Opens a WebSocket to the engine service, sends one request frame and
//! prints the response. `listen` stays connected and tails the trade
//! broadcast stream.

use clap::{Parser, Subcommand};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Parser)]
#[command(name = "tickmatch-cli")]
#[command(about = "Command line client for the tickmatch matching engine")]
struct Cli {
    /// WebSocket endpoint of the engine service
    #[arg(short, long, default_value = "ws://localhost:8080/ws")]
    server: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a limit order
    Submit {
        #[arg(short = 's', long)]
        symbol: String,
        #[arg(long, value_parser = parse_side)]
        side: OrderSide,
        #[arg(short = 'p', long)]
        price: f64,
        #[arg(short = 'q', long)]
        quantity: u64,
    },
    /// Cancel a resting order by engine-assigned id
    Cancel {
        #[arg(short, long)]
        order_id: u64,
    },
    /// Print the current book for one symbol, or all books
    Book {
        #[arg(short, long, default_value = "")]
        symbol: String,
    },
    /// Stream trade notifications until interrupted
    Listen,
}

#[derive(Clone, Copy, Debug)]
enum OrderSide {
    Buy,
    Sell,
}

#[derive(Deserialize)]
struct BookResponse {
    symbols: Vec<SymbolBook>,
}

#[derive(Deserialize)]
struct SymbolBook {
    symbol: String,
    buy_orders: Vec<LevelEntry>,
    sell_orders: Vec<LevelEntry>,
}

#[derive(Deserialize)]
struct LevelEntry {
    price: f64,
    orders: Vec<OrderEntry>,
}

#[derive(Deserialize)]
struct OrderEntry {
    id: u64,
    quantity: u64,
}

fn parse_side(s: &str) -> Result<OrderSide, String> {
    match s.to_lowercase().as_str() {
        "buy" | "bid" | "b" => Ok(OrderSide::Buy),
        "sell" | "ask" | "s" => Ok(OrderSide::Sell),
        _ => Err(format!("Invalid side: {s}. Use 'buy' or 'sell'")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (mut ws, _) = connect_async(cli.server.as_str()).await?;
    // The server pushes an all-books snapshot on connect; consume it so
    // command responses line up.
    let welcome = wait_for(&mut ws, "book_response").await?;

    match cli.command {
        Commands::Submit {
            symbol,
            side,
            price,
            quantity,
        } => {
            let frame = json!({
                "type": "order",
                "action": "add",
                "symbol": symbol,
                "order": {
                    "id": 0,
                    "price": price,
                    "quantity": quantity,
                    "is_buy": matches!(side, OrderSide::Buy),
                },
            });
            ws.send(Message::Text(frame.to_string())).await?;

            let response = wait_for(&mut ws, "order_response").await?;
            print_order_response(&response);
        }

        Commands::Cancel { order_id } => {
            let frame = json!({
                "type": "order",
                "action": "cancel",
                "order_id": order_id,
            });
            ws.send(Message::Text(frame.to_string())).await?;

            let response = wait_for(&mut ws, "cancel_response").await?;
            let success = response["success"].as_bool().unwrap_or(false);
            let message = response["message"].as_str().unwrap_or("");
            println!(
                "{}: order {} ({})",
                if success { "OK" } else { "FAILED" },
                order_id,
                message
            );
        }

        Commands::Book { symbol } => {
            let frame = json!({
                "type": "book",
                "action": "query",
                "symbol": symbol,
            });
            ws.send(Message::Text(frame.to_string())).await?;

            let response = wait_for(&mut ws, "book_response").await?;
            print_books(&response);
        }

        Commands::Listen => {
            print_books(&welcome);
            println!("listening for trades (ctrl-c to stop)...");
            loop {
                let trade = wait_for(&mut ws, "trade").await?;
                println!(
                    "trade #{}: {} {} @ {} (buy {} / sell {})",
                    trade["trade_id"],
                    trade["symbol"].as_str().unwrap_or("?"),
                    trade["quantity"],
                    trade["price"],
                    trade["buy_order_id"],
                    trade["sell_order_id"],
                );
            }
        }
    }

    let _ = ws.close(None).await;
    Ok(())
}

/// Reads frames until one with the wanted `type` tag arrives. Trade
/// broadcasts and other interleaved frames are skipped.
async fn wait_for(ws: &mut WsStream, wanted: &str) -> Result<Value, Box<dyn std::error::Error>> {
    while let Some(frame) = ws.next().await {
        match frame? {
            Message::Text(text) => {
                let value: Value = serde_json::from_str(&text)?;
                if value.get("type").and_then(Value::as_str) == Some(wanted) {
                    return Ok(value);
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Err("connection closed before the response arrived".into())
}

fn print_order_response(response: &Value) {
    let success = response["success"].as_bool().unwrap_or(false);
    println!("Status: {}", if success { "accepted" } else { "rejected" });
    println!("Order ID: {}", response["order_id"]);
    if let Some(message) = response["message"].as_str() {
        println!("Message: {message}");
    }
}

fn print_books(response: &Value) {
    let books: BookResponse = match serde_json::from_value(response.clone()) {
        Ok(books) => books,
        Err(err) => {
            println!("unreadable book response: {err}");
            return;
        }
    };
    if books.symbols.is_empty() {
        println!("no books");
        return;
    }

    for book in books.symbols {
        println!("=== {} ===", book.symbol);
        for (label, levels) in [("Asks", &book.sell_orders), ("Bids", &book.buy_orders)] {
            println!("{label}:");
            if levels.is_empty() {
                println!("  (empty)");
                continue;
            }
            for level in levels {
                let total: u64 = level.orders.iter().map(|o| o.quantity).sum();
                let queue: Vec<String> = level
                    .orders
                    .iter()
                    .map(|o| format!("#{}:{}", o.id, o.quantity))
                    .collect();
                println!("  {} x {} [{}]", level.price, total, queue.join(", "));
            }
        }
    }
}
