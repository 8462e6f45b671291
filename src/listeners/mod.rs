//! Built-in gateway event listeners.

pub mod member_join;
pub mod ready;

use crate::loader::ListenerModule;

pub fn catalog() -> Vec<ListenerModule> {
    vec![
        ListenerModule::new("ready", ready::Ready),
        ListenerModule::new("member_join", member_join::MemberJoin),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_listeners;

    #[test]
    fn catalog_loads_cleanly() {
        let loaded = load_listeners(catalog());
        assert_eq!(loaded.definitions.len(), 2);
        assert!(loaded.definitions.iter().any(|d| d.name == "READY" && d.once));
        assert!(loaded.definitions.iter().any(|d| d.name == "GUILD_MEMBER_ADD" && !d.once));
    }
}
