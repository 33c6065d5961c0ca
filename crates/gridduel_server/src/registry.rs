//! Identity ↔ connection bindings.

use derive_more::Display;
use gridduel_rules::Player;
use std::collections::{BTreeMap, BTreeSet};
use strum::IntoEnumIterator;
use tracing::{debug, info, instrument, warn};

/// Client-supplied identifier from the connection URL.
pub type ClientId = String;

/// One identity bound to one connection.
#[derive(Debug, Clone)]
pub struct PlayerSlot<C> {
    /// Bound identity.
    pub player: Player,
    /// Connection handle used for publishing.
    pub handle: C,
    /// Identifier the client connected with, if any.
    pub client_id: Option<ClientId>,
}

/// Why a connection could not be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Rejection {
    /// Both identities are bound.
    #[display("Session already has 2 players")]
    TooManyPlayers,
    /// Another live connection already uses this client id.
    #[display("Client id is already bound to a player")]
    DuplicateClient,
}

impl std::error::Error for Rejection {}

/// Assigns and releases the two player identities.
///
/// Not synchronized on its own: the owning session keeps it behind the same
/// lock as the game state so binding and the `connected_players` update
/// happen together.
#[derive(Debug)]
pub struct PlayerRegistry<C> {
    slots: BTreeMap<Player, PlayerSlot<C>>,
    reject_duplicates: bool,
}

impl<C> PlayerRegistry<C> {
    /// Creates an empty registry.
    pub fn new(reject_duplicates: bool) -> Self {
        Self {
            slots: BTreeMap::new(),
            reject_duplicates,
        }
    }

    /// Binds `handle` to the first free identity, `X` before `O`.
    #[instrument(skip(self, handle))]
    pub fn connect(&mut self, handle: C, client_id: Option<ClientId>) -> Result<Player, Rejection> {
        if self.reject_duplicates
            && let Some(id) = client_id.as_deref()
            && self.slots.values().any(|slot| slot.client_id.as_deref() == Some(id))
        {
            warn!(client_id = id, "Client id already bound");
            return Err(Rejection::DuplicateClient);
        }

        let Some(player) = Player::iter().find(|player| !self.slots.contains_key(player)) else {
            warn!("Session already has 2 players");
            return Err(Rejection::TooManyPlayers);
        };

        info!(%player, "Binding connection");
        self.slots.insert(
            player,
            PlayerSlot {
                player,
                handle,
                client_id,
            },
        );
        Ok(player)
    }

    /// Releases `player`'s slot. Unbound identities are a no-op.
    #[instrument(skip(self))]
    pub fn disconnect(&mut self, player: Player) -> Option<PlayerSlot<C>> {
        let slot = self.slots.remove(&player);
        if slot.is_none() {
            debug!(%player, "Disconnect for unbound identity ignored");
        }
        slot
    }

    /// Returns the connection bound to `player`.
    pub fn connection_for(&self, player: Player) -> Option<&C> {
        self.slots.get(&player).map(|slot| &slot.handle)
    }

    /// Iterates bound connections in identity order.
    pub fn connections(&self) -> impl Iterator<Item = (Player, &C)> {
        self.slots.iter().map(|(player, slot)| (*player, &slot.handle))
    }

    /// Identities currently bound.
    pub fn connected_players(&self) -> BTreeSet<Player> {
        self.slots.keys().copied().collect()
    }

    /// Number of bound identities.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no identity is bound.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
