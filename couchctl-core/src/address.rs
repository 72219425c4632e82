//! Host matching helpers
//!
//! Callers may pass addresses with or without a port while the cluster
//! reports its own form, so comparisons ignore everything after the first
//! `:` on both sides.

/// Strip a `:port` suffix (and anything after it)
pub fn strip_port(addr: &str) -> &str {
    addr.split(':').next().unwrap_or(addr)
}

/// Compare two addresses by host only
pub fn hosts_match(a: &str, b: &str) -> bool {
    strip_port(a) == strip_port(b)
}

/// True if any entry of `set` matches `item` by host
pub fn contains_host<S: AsRef<str>>(set: &[S], item: &str) -> bool {
    set.iter().any(|elem| hosts_match(elem.as_ref(), item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("node1:8091"), "node1");
        assert_eq!(strip_port("node1"), "node1");
        assert_eq!(strip_port(""), "");
    }

    #[test]
    fn test_contains_host() {
        let set = vec!["node1", "node2:8091"];
        assert!(contains_host(&set, "node1:8091"));
        assert!(contains_host(&set, "node2"));
        assert!(!contains_host(&set, "node3"));
        assert!(!contains_host::<&str>(&[], "node1"));
    }

    proptest! {
        #[test]
        fn prop_port_is_ignored(host in "[a-z][a-z0-9.-]{0,20}", port in 1u16..) {
            let with_port = format!("{}:{}", host, port);
            prop_assert!(hosts_match(&with_port, &host));
            prop_assert!(hosts_match(&host, &with_port));
        }

        #[test]
        fn prop_distinct_hosts_never_match(a in "[a-m]{1,8}", b in "[n-z]{1,8}", port in 1u16..) {
            let a_with_port = format!("{}:{}", a, port);
            prop_assert!(!hosts_match(&a_with_port, &b));
        }
    }
}
