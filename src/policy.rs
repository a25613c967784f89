//! Ownership policy for mutations. Every write against an owned resource
//! (article update/delete, comment delete) goes through this check rather
//! than comparing ids inline at each call site.

pub fn can_mutate(actor_id: i64, owner_id: i64) -> bool {
    actor_id == owner_id
}

#[cfg(test)]
mod tests {
    use super::can_mutate;

    #[test]
    fn only_the_owner_may_mutate() {
        assert!(can_mutate(1, 1));
        assert!(!can_mutate(1, 2));
        assert!(!can_mutate(2, 1));
    }
}
