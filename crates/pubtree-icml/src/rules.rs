//! Ordered predicate dispatch
//!
//! A [`RuleSet`] is a list of `(predicate, handler)` pairs tested in
//! registration order; the first matching predicate wins and a mandatory
//! default handles everything else. Handlers are plain function pointers,
//! so a rule can be looked up while the traversal state is borrowed and then
//! invoked with that state mutably.

/// Rule predicate over the traversal state and the current node
pub type Predicate<S, N> = fn(&S, &N) -> bool;

/// Rule handler: writes its production into `O`
pub type Handler<S, N, O> = fn(&mut S, &N, &mut O);

struct Rule<S, N, O> {
    name: &'static str,
    predicate: Predicate<S, N>,
    handler: Handler<S, N, O>,
}

/// Ordered dispatch table
pub struct RuleSet<S, N, O> {
    rules: Vec<Rule<S, N, O>>,
    default: Handler<S, N, O>,
}

impl<S, N, O> RuleSet<S, N, O> {
    /// Create a table with only the catch-all rule
    pub fn new(default: Handler<S, N, O>) -> Self {
        Self {
            rules: Vec::new(),
            default,
        }
    }

    /// Register a rule after all existing ones
    pub fn rule(mut self, name: &'static str, predicate: Predicate<S, N>, handler: Handler<S, N, O>) -> Self {
        self.rules.push(Rule {
            name,
            predicate,
            handler,
        });
        self
    }

    /// Name and handler of the first rule matching `node`
    pub fn select(&self, state: &S, node: &N) -> (&'static str, Handler<S, N, O>) {
        self.rules
            .iter()
            .find(|r| (r.predicate)(state, node))
            .map(|r| (r.name, r.handler))
            .unwrap_or(("default", self.default))
    }

    pub fn len(&self) -> usize {
        self.rules.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl<S, N, O> std::fmt::Debug for RuleSet<S, N, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.rules.iter().map(|r| r.name).collect();
        f.debug_struct("RuleSet").field("rules", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RuleSet<Vec<&'static str>, i32, String> {
        RuleSet::new(|seen: &mut Vec<&'static str>, _n: &i32, out: &mut String| {
            seen.push("default");
            out.push('.');
        })
        .rule("negative", |_, n| *n < 0, |seen, _, out| {
            seen.push("negative");
            out.push('-');
        })
        .rule("small", |_, n| *n < 10, |seen, _, out| {
            seen.push("small");
            out.push('s');
        })
    }

    #[test]
    fn test_first_match_wins() {
        let rules = table();
        let mut seen = Vec::new();
        let mut out = String::new();
        for n in [-5, 3, 42] {
            let (_, handler) = rules.select(&seen, &n);
            handler(&mut seen, &n, &mut out);
        }
        assert_eq!(seen, vec!["negative", "small", "default"]);
        assert_eq!(out, "-s.");
    }

    #[test]
    fn test_select_reports_name() {
        let rules = table();
        assert_eq!(rules.select(&Vec::new(), &-1).0, "negative");
        assert_eq!(rules.select(&Vec::new(), &100).0, "default");
        assert_eq!(rules.len(), 3);
    }
}
