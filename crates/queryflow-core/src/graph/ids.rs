/// Hands out `<kind>_<n>` ids from one monotonic counter per graph build.
///
/// A fresh generator is created for every statement, so ids are unique within one
/// parse and deterministic for identical input.
#[derive(Debug, Default)]
pub(crate) struct IdGenerator {
    next_node: usize,
    next_edge: usize,
}

impl IdGenerator {
    pub(crate) fn node(&mut self, kind: &str) -> String {
        let id = format!("{kind}_{}", self.next_node);
        self.next_node += 1;
        id
    }

    pub(crate) fn edge(&mut self) -> String {
        let id = format!("edge_{}", self.next_edge);
        self.next_edge += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic_across_kinds() {
        let mut ids = IdGenerator::default();
        assert_eq!(ids.node("table"), "table_0");
        assert_eq!(ids.node("filter"), "filter_1");
        assert_eq!(ids.edge(), "edge_0");
        assert_eq!(ids.node("select"), "select_2");
    }
}
