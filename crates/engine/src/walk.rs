//! The one subtree traversal every lifecycle algorithm shares.
//!
//! Trash, restore, permanent delete and export all walk the same
//! parent/child relation; they differ only in which children they select
//! and what they do at each node. This module provides the walk; the
//! algorithms are small visitors over its event sequence.

use crate::Engine;
use crate::error::{ErrorKind, Result};
use depot_catalog::{ChildFilter, Directory, FileRef};
use exn::ResultExt;
use std::collections::HashSet;
use uuid::Uuid;

/// One step of a depth-first subtree walk.
///
/// For every directory the sequence is `EnterDir`, then one `File` per
/// selected child file, then the events of each selected child directory,
/// then `LeaveDir`. `LeaveDir` events therefore arrive children-first,
/// which is exactly the order deletion wants.
pub(crate) enum Event {
    EnterDir(Directory),
    File(FileRef),
    LeaveDir(Directory),
}

enum Frame {
    Enter(Directory),
    Leave(Directory),
}

impl Engine {
    /// Collect the depth-first event sequence for a subtree.
    ///
    /// Carries a visited-set keyed by directory id: parent/child links are
    /// not referentially enforced in the catalog, so a forged cycle or a
    /// duplicated link must terminate and process each node at most once.
    /// That same property makes every visitor safely re-runnable.
    pub(crate) async fn walk_subtree(&self, user_id: Uuid, root: &Directory, filter: ChildFilter) -> Result<Vec<Event>> {
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut events = Vec::new();
        let mut stack = vec![Frame::Enter(root.clone())];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Leave(dir) => events.push(Event::LeaveDir(dir)),
                Frame::Enter(dir) => {
                    if !visited.insert(dir.id) {
                        continue;
                    }
                    let files = self.files.children(user_id, dir.id, filter).await.or_raise(|| ErrorKind::Catalog)?;
                    let children = self.dirs.children(user_id, dir.id, filter).await.or_raise(|| ErrorKind::Catalog)?;

                    stack.push(Frame::Leave(dir.clone()));
                    // Reversed so children pop in listing order.
                    for child in children.into_iter().rev() {
                        stack.push(Frame::Enter(child));
                    }
                    events.push(Event::EnterDir(dir));
                    events.extend(files.into_iter().map(Event::File));
                },
            }
        }
        Ok(events)
    }
}
