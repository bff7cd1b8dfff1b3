use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{info, warn};
use uuid::Uuid;

use crate::models::{ClientFrame, Connect, Disconnect, GameMsg, LobbyMsg, WsFrame};
use crate::server::GameServer;

/// WebSocket transport actor for one connection. Parses JSON frames into
/// typed actions and forwards them to the game server; pushes serialized
/// server frames back out.
pub struct WsSession {
    pub id: Uuid,
    pub name: Option<String>,
    pub server: Addr<GameServer>,
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, _: &mut Self::Context) {
        info!("WebSocket connection started: {}", self.id);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        info!("WebSocket connection closed: {}", self.id);
        if let Some(name) = self.name.take() {
            self.server.do_send(Disconnect {
                name,
                conn_id: self.id,
            });
        }
        Running::Stop
    }
}

impl Handler<WsFrame> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: WsFrame, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(frame) => self.handle_frame(frame, ctx),
                Err(err) => {
                    warn!("Connection {} sent an unparseable frame: {}", self.id, err);
                }
            },
            Ok(ws::Message::Binary(_)) => {
                warn!("Binary messages are not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            _ => {
                ctx.stop();
            }
        }
    }
}

impl WsSession {
    fn handle_frame(&mut self, frame: ClientFrame, ctx: &mut ws::WebsocketContext<Self>) {
        match frame {
            ClientFrame::Join { name } => self.handle_join(name, ctx),
            ClientFrame::Lobby { action } => {
                let Some(name) = self.name.clone() else {
                    warn!("Connection {} sent a lobby action before joining", self.id);
                    return;
                };
                self.server.do_send(LobbyMsg {
                    name,
                    conn_id: self.id,
                    action,
                });
            }
            ClientFrame::Game { action } => {
                let Some(name) = self.name.clone() else {
                    warn!("Connection {} sent a game action before joining", self.id);
                    return;
                };
                self.server.do_send(GameMsg {
                    name,
                    conn_id: self.id,
                    action,
                });
            }
        }
    }

    fn handle_join(&mut self, name: String, ctx: &mut ws::WebsocketContext<Self>) {
        if name.is_empty() {
            // Fatal protocol violation.
            warn!("Connection {} sent an empty name", self.id);
            ctx.stop();
            return;
        }
        if self.name.is_some() {
            warn!("Connection {} tried to join twice", self.id);
            return;
        }

        info!("Connection {} has name {}", self.id, name);
        self.name = Some(name.clone());

        self.server
            .send(Connect {
                name,
                conn_id: self.id,
                addr: ctx.address().recipient(),
            })
            .into_actor(self)
            .then(|accepted, act, ctx| {
                // A live connection already owns this name; drop this one.
                if !matches!(accepted, Ok(true)) {
                    info!("Connection {} rejected (duplicate login)", act.id);
                    ctx.stop();
                }
                fut::ready(())
            })
            .wait(ctx);
    }
}

/// WebSocket connection handler
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    server: web::Data<Addr<GameServer>>,
) -> Result<HttpResponse, Error> {
    let session = WsSession {
        id: Uuid::new_v4(),
        name: None,
        server: server.get_ref().clone(),
    };
    ws::start(session, &req, stream)
}
