//! Canonical object encodings and their SHA-256 ids.
//!
//! | Object | Encoding |
//! |--------|----------|
//! | blob   | `blob <len>\0` followed by the bytes |
//! | tree   | `tree <count>\0` then per entry, in name order: `f`/`d`, field(name), 32 id bytes |
//! | commit | `commit <parents>\0`, tree id, parent ids, author, committer, field(message) |
//!
//! `field(x)` is the byte length of `x` as a big-endian `u64` followed by the
//! bytes. A signature is field(name), field(email), then the timestamp as a
//! big-endian `i64`. Every variable-length part is length-prefixed, so no
//! name or message content can shift bytes from one field into the next.
//!
//! Trees are always encoded in lexicographic name order, so two trees with
//! the same entries hash identically regardless of how they were built.

use sha2::{Digest, Sha256};

use crate::types::{CommitMeta, EntryKind, ObjectId, Signature, Tree};

/// Id of a blob with the given content.
#[must_use]
pub fn blob_id(bytes: &[u8]) -> ObjectId {
    let mut hasher = Sha256::new();
    hasher.update(format!("blob {}\0", bytes.len()).as_bytes());
    hasher.update(bytes);
    finish(hasher)
}

/// Id of a tree.
#[must_use]
pub fn tree_id(tree: &Tree) -> ObjectId {
    let mut hasher = Sha256::new();
    hasher.update(format!("tree {}\0", tree.len()).as_bytes());
    for (name, entry) in tree.iter() {
        let tag: &[u8] = match entry.kind {
            EntryKind::File => b"f",
            EntryKind::Directory => b"d",
        };
        hasher.update(tag);
        field(&mut hasher, name.as_bytes());
        hasher.update(entry.id.as_bytes());
    }
    finish(hasher)
}

/// Id of a commit with the given parents, root tree, and metadata.
#[must_use]
pub fn commit_id(parents: &[ObjectId], tree: ObjectId, meta: &CommitMeta) -> ObjectId {
    let mut hasher = Sha256::new();
    hasher.update(format!("commit {}\0", parents.len()).as_bytes());
    hasher.update(tree.as_bytes());
    for parent in parents {
        hasher.update(parent.as_bytes());
    }
    signature(&mut hasher, &meta.author);
    signature(&mut hasher, &meta.committer);
    field(&mut hasher, meta.message.as_bytes());
    finish(hasher)
}

/// Id of the empty tree.
#[must_use]
pub fn empty_tree_id() -> ObjectId {
    tree_id(&Tree::new())
}

fn field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

fn signature(hasher: &mut Sha256, sig: &Signature) {
    field(hasher, sig.name.as_bytes());
    field(hasher, sig.email.as_bytes());
    hasher.update(sig.timestamp.to_be_bytes());
}

fn finish(hasher: Sha256) -> ObjectId {
    ObjectId::from_bytes(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TreeEntry;

    #[test]
    fn blob_id_is_stable() {
        assert_eq!(blob_id(b"abc"), blob_id(b"abc"));
        assert_ne!(blob_id(b"abc"), blob_id(b"abd"));
    }

    #[test]
    fn empty_blob_and_empty_tree_differ() {
        assert_ne!(blob_id(b""), empty_tree_id());
    }

    #[test]
    fn blob_length_prefix_prevents_tree_collision() {
        // The raw encoding of an empty tree is never a valid blob encoding.
        assert_ne!(blob_id(b"tree 0\0"), empty_tree_id());
    }

    #[test]
    fn entry_names_cannot_absorb_neighbouring_bytes() {
        let mut shifted_id = [0u8; 32];
        shifted_id[31] = b'f';

        let mut a = Tree::new();
        a.insert("a", TreeEntry::file(ObjectId::from_bytes([0; 32])));
        a.insert("fx", TreeEntry::file(ObjectId::from_bytes([7; 32])));

        let mut b = Tree::new();
        b.insert("a\0", TreeEntry::file(ObjectId::from_bytes(shifted_id)));
        b.insert("x", TreeEntry::file(ObjectId::from_bytes([7; 32])));

        assert_ne!(a, b);
        assert_ne!(tree_id(&a), tree_id(&b));
    }

    #[test]
    fn commit_fields_cannot_shift_into_each_other() {
        let tree = empty_tree_id();
        let meta = |author: &str, committer: &str, message: &str| CommitMeta {
            author: Signature::new(author, "a@example.com", 1),
            committer: Signature::new(committer, "c@example.com", 1),
            message: message.to_owned(),
        };
        assert_ne!(
            commit_id(&[], tree, &meta("ann", "bob", "msg\n")),
            commit_id(&[], tree, &meta("ann", "bob", "msg")),
        );
        assert_ne!(
            commit_id(&[], tree, &meta("ann <x> 1\ncommitter bob", "bob", "m")),
            commit_id(&[], tree, &meta("ann", "bob", "m")),
        );
    }
}
