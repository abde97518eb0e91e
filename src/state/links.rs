//! Static link graph.
//!
//! Maps each user to the peers it receives presence updates about and may
//! pulse. Built once from configuration and never mutated. Links are
//! directed: `a = ["b"]` without `b = ["a"]` is legal and makes `a`'s
//! status changes reach `b` (and lets `a` pulse `b`), but not the reverse.

use pulse_proto::UserId;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Read-only mapping from a user to its linked peers.
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    links: HashMap<UserId, HashSet<UserId>>,
}

impl LinkGraph {
    /// Build from the `[links]` configuration table.
    pub fn from_config(table: &BTreeMap<String, Vec<String>>) -> Self {
        table
            .iter()
            .map(|(user, peers)| {
                (
                    UserId::from(user.as_str()),
                    peers.iter().map(|p| UserId::from(p.as_str())),
                )
            })
            .collect()
    }

    /// Peers linked from `user`. Empty for unknown users.
    pub fn peers<'a>(&'a self, user: &str) -> impl Iterator<Item = &'a UserId> + 'a {
        self.links.get(user).into_iter().flatten()
    }

    /// Whether `from` lists `to` as a peer.
    pub fn is_linked(&self, from: &str, to: &str) -> bool {
        self.links.get(from).is_some_and(|peers| peers.contains(to))
    }

    /// Number of users with an entry.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl<P> FromIterator<(UserId, P)> for LinkGraph
where
    P: IntoIterator<Item = UserId>,
{
    fn from_iter<I: IntoIterator<Item = (UserId, P)>>(iter: I) -> Self {
        let mut links: HashMap<UserId, HashSet<UserId>> = HashMap::new();
        for (user, peers) in iter {
            links.entry(user).or_default().extend(peers);
        }
        Self { links }
    }
}

#[cfg(test)]
pub(crate) fn graph(edges: &[(&str, &[&str])]) -> LinkGraph {
    edges
        .iter()
        .map(|(user, peers)| {
            (
                UserId::from(*user),
                peers.iter().map(|p| UserId::from(*p)).collect::<Vec<_>>(),
            )
        })
        .collect()
}
