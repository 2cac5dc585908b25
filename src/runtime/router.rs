use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolRole {
    /// Feeds the shared trend estimator only.
    Reference,
    Traded,
    /// Reference asset that is also traded.
    Both,
}

impl SymbolRole {
    pub fn is_reference(self) -> bool {
        matches!(self, Self::Reference | Self::Both)
    }

    pub fn is_traded(self) -> bool {
        matches!(self, Self::Traded | Self::Both)
    }

    fn merge(self, other: Self) -> Self {
        if self == other {
            self
        } else {
            Self::Both
        }
    }
}

/// Subscribed symbols and what each one's candles drive.
#[derive(Debug, Default)]
pub struct SymbolRouter {
    roles: BTreeMap<String, SymbolRole>,
}

impl SymbolRouter {
    pub fn new(reference_symbol: &str, traded: &[String]) -> Self {
        let mut router = Self::default();
        router.register(reference_symbol, SymbolRole::Reference);
        for symbol in traded {
            router.register(symbol, SymbolRole::Traded);
        }
        router
    }

    pub fn register(&mut self, symbol: &str, role: SymbolRole) {
        let key = normalize(symbol);
        if key.is_empty() {
            return;
        }
        self.roles
            .entry(key)
            .and_modify(|existing| *existing = existing.merge(role))
            .or_insert(role);
    }

    pub fn unregister(&mut self, symbol: &str) {
        self.roles.remove(&normalize(symbol));
    }

    /// Normalized key and role, or `None` for an unsubscribed symbol.
    pub fn route(&self, symbol: &str) -> Option<(String, SymbolRole)> {
        let key = normalize(symbol);
        let role = *self.roles.get(&key)?;
        Some((key, role))
    }

    /// Return symbols in deterministic lexical order.
    pub fn symbols(&self) -> Vec<String> {
        self.roles.keys().cloned().collect()
    }
}

fn normalize(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}
