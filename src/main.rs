#[tokio::main]
async fn main() {
    campus_dining::start_server().await;
}
