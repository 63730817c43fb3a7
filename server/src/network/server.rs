//! UDP game server implementation.
//!
//! Every remote address is one connection. A datagram carries one
//! JSON-encoded client message; every flushed batch goes out as one JSON
//! array of message tuples.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::net::UdpSocket;

use realm_server::entities::EntityId;
use realm_server::world::{Connection, GameWorld};
use realm_shared::ServerMessage;

/// Maximum datagram size accepted from clients
const MAX_PACKET_SIZE: usize = 8192;

/// Outbound half of one remote address
struct UdpConnection {
    socket: Arc<UdpSocket>,
    addr: SocketAddr,
}

impl UdpConnection {
    fn send_bytes(&self, bytes: &[u8]) {
        if let Err(e) = self.socket.try_send_to(bytes, self.addr) {
            warn!("Failed to send to {}: {}", self.addr, e);
        }
    }
}

impl Connection for UdpConnection {
    fn send(&mut self, batch: &[ServerMessage]) {
        match ServerMessage::encode_batch(batch) {
            Ok(bytes) => self.send_bytes(&bytes),
            Err(e) => error!("Failed to encode batch for {}: {}", self.addr, e),
        }
    }

    fn send_text(&mut self, text: &str) {
        self.send_bytes(text.as_bytes());
    }

    fn close(&mut self, reason: &str) {
        info!("Closing connection {} ({})", self.addr, reason);
    }
}

/// Where a remote address lives
#[derive(Debug, Clone, Copy)]
struct ClientConnection {
    world: usize,
    player_id: EntityId,
}

/// Game server
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: HashMap<SocketAddr, ClientConnection>,
}

impl Server {
    /// Create a new server listening on the given port
    pub async fn new(port: u16) -> Result<Self, std::io::Error> {
        let addr = format!("0.0.0.0:{}", port);
        let socket = UdpSocket::bind(&addr).await?;
        info!("Listening on {}", addr);

        Ok(Self {
            socket: Arc::new(socket),
            clients: HashMap::new(),
        })
    }

    pub fn connection_count(&self) -> usize {
        self.clients.len()
    }

    /// Drain every datagram waiting on the socket without blocking
    pub fn process_incoming(&mut self, worlds: &mut [GameWorld]) {
        let mut buf = [0u8; MAX_PACKET_SIZE];

        loop {
            match self.socket.try_recv_from(&mut buf) {
                Ok((len, addr)) => self.handle_packet(&buf[..len], addr, worlds),
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    break;
                }
            }
        }
    }

    fn handle_packet(&mut self, data: &[u8], addr: SocketAddr, worlds: &mut [GameWorld]) {
        let client = match self.clients.get(&addr) {
            Some(client) => *client,
            None => match self.accept(addr, worlds) {
                Some(client) => client,
                None => return,
            },
        };

        match worlds.get_mut(client.world) {
            Some(world) => world.receive(client.player_id, data),
            None => debug!("Packet from {} for missing world {}", addr, client.world),
        }
    }

    /// Route a new address to the first world with room for it
    fn accept(&mut self, addr: SocketAddr, worlds: &mut [GameWorld]) -> Option<ClientConnection> {
        let Some(index) = worlds.iter().position(|world| !world.is_full()) else {
            warn!("All worlds are full, ignoring {}", addr);
            return None;
        };

        let connection = UdpConnection {
            socket: Arc::clone(&self.socket),
            addr,
        };
        let world = &mut worlds[index];
        let player_id = world.connect(Box::new(connection));
        info!("{} connected to {} as {}", addr, world.id(), player_id);

        let client = ClientConnection {
            world: index,
            player_id,
        };
        self.clients.insert(addr, client);

        let total = total_population(worlds);
        worlds[index].update_population(total);
        Some(client)
    }

    /// Forget addresses whose sessions were closed by their world
    pub fn prune_closed(&mut self, worlds: &mut [GameWorld]) {
        for (index, world) in worlds.iter_mut().enumerate() {
            let closed = world.drain_closed();
            if closed.is_empty() {
                continue;
            }
            self.clients
                .retain(|_, client| client.world != index || !closed.contains(&client.player_id));
            debug!("{}: {} connections closed", world.id(), closed.len());
        }
    }
}

/// Players across every world
pub fn total_population(worlds: &[GameWorld]) -> u32 {
    worlds.iter().map(GameWorld::player_count).sum()
}
