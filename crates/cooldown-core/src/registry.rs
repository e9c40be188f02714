//! Registry - 名前から実体を引くための名前空間ツリー
//!
//! resume タイマーは別プロセスで発火しうるので、対象は文字列で保存され、
//! 発火時にこのレジストリで解決される。
//!
//! # 名前の規則
//! - `::` を含む名前は入れ子の名前空間として先頭から辿る（`Acme::Apis::Twitter`）
//! - 含まない名前はトップレベルの 1 段だけを見る
//! - 先頭の `::` はルート起点を表し、無視してよい（`::Twitter` == `Twitter`）
//!
//! # 設計
//! - 起動時に構築（mutable）、実行時は読み取りのみ（immutable）
//! - 同じ `Arc` を複数のパスに登録できる（エイリアス）

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::CooldownError;

pub const SEPARATOR: &str = "::";

enum Node<T: ?Sized> {
    Entry(Arc<T>),
    Namespace(Namespace<T>),
}

impl<T: ?Sized> Clone for Node<T> {
    fn clone(&self) -> Self {
        match self {
            Node::Entry(entry) => Node::Entry(Arc::clone(entry)),
            Node::Namespace(ns) => Node::Namespace(ns.clone()),
        }
    }
}

struct Namespace<T: ?Sized> {
    children: HashMap<String, Node<T>>,
}

impl<T: ?Sized> Namespace<T> {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
        }
    }

    fn collect_names(&self, prefix: &str, out: &mut Vec<String>) {
        for (segment, node) in &self.children {
            let path = if prefix.is_empty() {
                segment.clone()
            } else {
                format!("{prefix}{SEPARATOR}{segment}")
            };
            match node {
                Node::Entry(_) => out.push(path),
                Node::Namespace(ns) => ns.collect_names(&path, out),
            }
        }
    }
}

impl<T: ?Sized> Clone for Namespace<T> {
    fn clone(&self) -> Self {
        Self {
            children: self.children.clone(),
        }
    }
}

/// Name → entity registry with nested namespaces.
pub struct Registry<T: ?Sized> {
    root: Namespace<T>,
}

impl<T: ?Sized> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a name into path segments, dropping a leading root anchor.
fn segments(name: &str) -> Result<Vec<&str>, CooldownError> {
    let trimmed = name.strip_prefix(SEPARATOR).unwrap_or(name);
    let parts: Vec<&str> = trimmed.split(SEPARATOR).collect();
    if parts.iter().any(|p| p.trim().is_empty()) {
        return Err(CooldownError::InvalidName(name.to_string()));
    }
    Ok(parts)
}

impl<T: ?Sized> Registry<T> {
    pub fn new() -> Self {
        Self {
            root: Namespace::new(),
        }
    }

    /// Register `entity` under `path`, creating intermediate namespaces.
    ///
    /// A path that is already taken (as an entity or a namespace), or that
    /// would nest under an entity, is a `DuplicateHandler` error.
    pub fn register(&mut self, path: &str, entity: Arc<T>) -> Result<(), CooldownError> {
        let parts = segments(path)?;
        let Some((leaf, parents)) = parts.split_last() else {
            return Err(CooldownError::InvalidName(path.to_string()));
        };

        let mut ns = &mut self.root;
        for segment in parents {
            let node = ns
                .children
                .entry((*segment).to_string())
                .or_insert_with(|| Node::Namespace(Namespace::new()));
            ns = match node {
                Node::Namespace(inner) => inner,
                Node::Entry(_) => return Err(CooldownError::DuplicateHandler(path.to_string())),
            };
        }

        if ns.children.contains_key(*leaf) {
            return Err(CooldownError::DuplicateHandler(path.to_string()));
        }
        ns.children.insert((*leaf).to_string(), Node::Entry(entity));
        Ok(())
    }

    /// Resolve a bare or `::`-qualified name.
    pub fn resolve(&self, name: &str) -> Result<Arc<T>, CooldownError> {
        let unknown = || CooldownError::UnknownHandler(name.to_string());
        let parts = segments(name)?;

        let mut ns = &self.root;
        let mut found: Option<&Node<T>> = None;
        for (i, segment) in parts.iter().enumerate() {
            let node = ns.children.get(*segment).ok_or_else(unknown)?;
            if i + 1 == parts.len() {
                found = Some(node);
            } else {
                ns = match node {
                    Node::Namespace(inner) => inner,
                    Node::Entry(_) => return Err(unknown()),
                };
            }
        }

        match found {
            Some(Node::Entry(entity)) => Ok(Arc::clone(entity)),
            _ => Err(unknown()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    /// Every registered path, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.root.collect_names("", &mut out);
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Copy every entry of `other` into `self`.
    pub fn merge(&mut self, other: &Registry<T>) -> Result<(), CooldownError> {
        for name in other.names() {
            let entity = other.resolve(&name)?;
            self.register(&name, entity)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Thing(&'static str);

    fn registry() -> Registry<Thing> {
        let mut reg = Registry::new();
        reg.register("RateLimitedTestQueue", Arc::new(Thing("top")))
            .unwrap();
        reg.register("Cooldown::Plugins::RateLimited", Arc::new(Thing("nested")))
            .unwrap();
        reg
    }

    #[test]
    fn resolves_simple_name() {
        let reg = registry();
        assert_eq!(*reg.resolve("RateLimitedTestQueue").unwrap(), Thing("top"));
    }

    #[test]
    fn resolves_qualified_name() {
        let reg = registry();
        assert_eq!(
            *reg.resolve("Cooldown::Plugins::RateLimited").unwrap(),
            Thing("nested")
        );
    }

    #[test]
    fn bare_and_qualified_names_share_identity() {
        let reg = registry();

        let bare = reg.resolve("RateLimitedTestQueue").unwrap();
        let anchored_bare = reg.resolve("::RateLimitedTestQueue").unwrap();
        let qualified = reg.resolve("Cooldown::Plugins::RateLimited").unwrap();
        let anchored = reg.resolve("::Cooldown::Plugins::RateLimited").unwrap();

        assert!(Arc::ptr_eq(&bare, &anchored_bare));
        assert!(Arc::ptr_eq(&qualified, &anchored));
    }

    #[test]
    fn unknown_names_are_fatal() {
        let reg = registry();
        for name in ["Missing", "Cooldown::Missing", "RateLimitedTestQueue::Nested"] {
            let err = reg.resolve(name).err().unwrap();
            assert!(matches!(err, CooldownError::UnknownHandler(n) if n == name));
        }
    }

    #[test]
    fn namespaces_are_not_entities() {
        let reg = registry();
        assert!(matches!(
            reg.resolve("Cooldown::Plugins"),
            Err(CooldownError::UnknownHandler(_))
        ));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut reg = registry();
        let err = reg
            .register("RateLimitedTestQueue", Arc::new(Thing("again")))
            .unwrap_err();
        assert!(matches!(err, CooldownError::DuplicateHandler(_)));

        let err = reg
            .register("Cooldown::Plugins", Arc::new(Thing("clash")))
            .unwrap_err();
        assert!(matches!(err, CooldownError::DuplicateHandler(_)));
    }

    #[test]
    fn malformed_names_are_rejected() {
        let mut reg = registry();
        assert!(matches!(
            reg.register("a::::b", Arc::new(Thing("x"))),
            Err(CooldownError::InvalidName(_))
        ));
        assert!(matches!(reg.resolve(""), Err(CooldownError::InvalidName(_))));
    }

    #[test]
    fn names_lists_full_paths() {
        let reg = registry();
        assert_eq!(
            reg.names(),
            vec![
                "Cooldown::Plugins::RateLimited".to_string(),
                "RateLimitedTestQueue".to_string()
            ]
        );
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn merge_copies_entries() {
        let mut target: Registry<Thing> = Registry::new();
        target.register("Local", Arc::new(Thing("local"))).unwrap();
        target.merge(&registry()).unwrap();

        assert_eq!(target.len(), 3);
        assert!(target.contains("Cooldown::Plugins::RateLimited"));
    }
}
