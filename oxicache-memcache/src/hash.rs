//! Key-to-server routing.

use wyhash::wyhash;

use crate::server::Server;

/// How keys are mapped onto the configured servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Hasher {
    /// Ignore the key and spread requests round-robin.
    None,
    /// `wyhash(key) % N`. Cheap, but most keys remap when the server set
    /// changes.
    Modulo,
    /// Highest random weight: score every server against the key and take
    /// the maximum. Only ~1/N keys remap when a server is added or removed.
    #[default]
    Rendezvous,
}

/// `wyhash(key) % N`.
pub(crate) fn modulo(servers: &[Server], key: &[u8]) -> usize {
    (wyhash(key, 0) % servers.len() as u64) as usize
}

/// Index of the server with the highest `(server, key)` score.
///
/// Ties go to the lowest index. O(N) per lookup.
pub(crate) fn rendezvous(servers: &[Server], key: &[u8]) -> usize {
    let mut best = 0;
    let mut best_score = wyhash(key, servers[0].hash_id());
    for (index, server) in servers.iter().enumerate().skip(1) {
        let score = wyhash(key, server.hash_id());
        if score > best_score {
            best = index;
            best_score = score;
        }
    }
    best
}
