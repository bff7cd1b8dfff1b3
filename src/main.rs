use actix::Actor;
use actix_web::{web, App, HttpServer};
use log::info;

use chess_arena::routes;
use chess_arena::server::GameServer;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting chess arena server at http://127.0.0.1:8080");

    // One orchestrator actor owns the lobby, the sessions and the registry.
    let server = GameServer::new().start();

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(server.clone()))
            .configure(routes::configure_routes)
    })
    .bind("127.0.0.1:8080")?
    .run()
    .await
}
