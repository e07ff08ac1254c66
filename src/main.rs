use flavour_fusion::start_server;

#[tokio::main]
async fn main() {
    start_server().await;
}
