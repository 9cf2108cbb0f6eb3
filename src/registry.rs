//! Plugin registries and definition evaluation.
//!
//! Discoverers, executors and filters are all built the same way: a
//! definition such as `(if-one-target (ssh-login) (csshx))` is parsed with
//! [`crate::sexp::parse`], the head of the list is looked up in the family's
//! [`Registry`], a fresh instance is constructed and then bound exactly once
//! with its arguments. Nested lists are resolved into child instances of the
//! same family before being handed to the parent.

use crate::error::{Result, SshfanError};
use crate::sexp::{self, Expr};
use std::collections::BTreeMap;
use std::fmt;

/// The three independent plugin namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Discoverer,
    Executor,
    Filter,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Family::Discoverer => "discoverer",
            Family::Executor => "executor",
            Family::Filter => "filter",
        };
        f.write_str(name)
    }
}

/// A single argument passed to a plugin when it is bound.
pub enum Arg<P> {
    /// A bare token, passed through as text.
    Literal(String),
    /// A nested definition, already resolved into a plugin of the same family.
    Child(P),
}

impl<P: fmt::Display> fmt::Display for Arg<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Literal(text) => write!(f, "\"{}\"", text),
            Arg::Child(child) => write!(f, "{}", child),
        }
    }
}

/// A plugin instance that can receive its arguments.
///
/// Implemented for the boxed trait object of each family so that one
/// [`Registry`] implementation serves all three.
pub trait Plugin: Sized + fmt::Display {
    /// Bind the arguments from the definition. Called exactly once, right
    /// after construction and before the instance is used.
    fn bind(&mut self, args: Vec<Arg<Self>>) -> Result<()>;
}

type Maker<P> = Box<dyn Fn() -> P + Send + Sync>;

/// Name to constructor mapping for one plugin family.
pub struct Registry<P> {
    family: Family,
    makers: BTreeMap<&'static str, Maker<P>>,
}

impl<P: Plugin> Registry<P> {
    /// Create an empty registry for `family`.
    pub fn new(family: Family) -> Self {
        Registry {
            family,
            makers: BTreeMap::new(),
        }
    }

    /// Register a constructor under `name`.
    pub fn register(
        mut self,
        name: &'static str,
        maker: impl Fn() -> P + Send + Sync + 'static,
    ) -> Self {
        self.makers.insert(name, Box::new(maker));
        self
    }

    /// All registered names, sorted alphabetically.
    pub fn names(&self) -> Vec<String> {
        self.makers.keys().map(|name| name.to_string()).collect()
    }

    /// Parse `definition` and build the plugin tree it describes.
    ///
    /// # Errors
    ///
    /// - [`SshfanError::ParseError`] if the definition is malformed
    /// - [`SshfanError::UnknownPlugin`] if any head names no registered plugin
    /// - whatever the plugins' binding step reports for bad arguments
    pub fn make(&self, definition: &str) -> Result<P> {
        let expr = sexp::parse(definition)?;
        let plugin = self.resolve(&expr, definition)?;
        tracing::debug!(family = %self.family, plugin = %plugin, "resolved definition");
        Ok(plugin)
    }

    fn resolve(&self, expr: &Expr, definition: &str) -> Result<P> {
        let (name, rest) = expr.as_form().ok_or_else(|| SshfanError::ParseError {
            definition: definition.to_string(),
            reason: "expected a plugin definition".into(),
        })?;

        let maker = self
            .makers
            .get(name)
            .ok_or_else(|| SshfanError::UnknownPlugin {
                family: self.family,
                name: name.to_string(),
                known: self.names(),
            })?;

        let mut plugin = maker();
        let args = rest
            .iter()
            .map(|arg| match arg {
                Expr::Atom(text) => Ok(Arg::Literal(text.clone())),
                Expr::List(_) => self.resolve(arg, definition).map(Arg::Child),
            })
            .collect::<Result<Vec<_>>>()?;
        plugin.bind(args)?;

        Ok(plugin)
    }
}

/// Fail unless `args` is empty.
pub fn require_no_arguments<P>(plugin: &str, args: &[Arg<P>]) -> Result<()> {
    require_arguments(plugin, 0, args)
}

/// Fail unless exactly `count` arguments were given.
pub fn require_arguments<P>(plugin: &str, count: usize, args: &[Arg<P>]) -> Result<()> {
    if args.len() != count {
        return Err(SshfanError::ArgumentCount {
            plugin: plugin.to_string(),
            expected: count.to_string(),
            got: args.len(),
        });
    }
    Ok(())
}

/// Take the one argument out of `args`, failing unless there is exactly one.
pub fn single<P>(plugin: &str, args: Vec<Arg<P>>) -> Result<Arg<P>> {
    let [arg] = <[Arg<P>; 1]>::try_from(args).map_err(|args| SshfanError::ArgumentCount {
        plugin: plugin.to_string(),
        expected: "1".to_string(),
        got: args.len(),
    })?;
    Ok(arg)
}

/// Unwrap arguments that must all be nested definitions.
pub fn children<P: fmt::Display>(plugin: &str, args: Vec<Arg<P>>) -> Result<Vec<P>> {
    args.into_iter()
        .map(|arg| match arg {
            Arg::Child(child) => Ok(child),
            Arg::Literal(text) => Err(SshfanError::ArgumentType {
                plugin: plugin.to_string(),
                reason: format!("expected a nested definition, got \"{}\"", text),
            }),
        })
        .collect()
}

/// Unwrap an argument that must be a non-empty literal.
pub fn literal<P: fmt::Display>(plugin: &str, arg: Arg<P>) -> Result<String> {
    match arg {
        Arg::Literal(text) if !text.is_empty() => Ok(text),
        other => Err(SshfanError::ArgumentType {
            plugin: plugin.to_string(),
            reason: format!("expected a single non-empty value, got {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Minimal family: records what it was bound with.
    #[derive(Default)]
    struct Node {
        name: &'static str,
        literals: Vec<String>,
        children: Vec<Node>,
        binds: usize,
    }

    impl fmt::Display for Node {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "<{}>", self.name)
        }
    }

    impl Plugin for Node {
        fn bind(&mut self, args: Vec<Arg<Self>>) -> Result<()> {
            self.binds += 1;
            for arg in args {
                match arg {
                    Arg::Literal(text) => self.literals.push(text),
                    Arg::Child(child) => self.children.push(child),
                }
            }
            Ok(())
        }
    }

    fn registry(built: Arc<AtomicUsize>) -> Registry<Node> {
        let (a, b) = (built.clone(), built);
        Registry::new(Family::Filter)
            .register("leaf", move || {
                a.fetch_add(1, Ordering::SeqCst);
                Node {
                    name: "leaf",
                    ..Node::default()
                }
            })
            .register("branch", move || {
                b.fetch_add(1, Ordering::SeqCst);
                Node {
                    name: "branch",
                    ..Node::default()
                }
            })
    }

    #[test]
    fn test_make_builds_tree() {
        let built = Arc::new(AtomicUsize::new(0));
        let node = registry(built.clone())
            .make("(branch x (leaf) (branch (leaf y)))")
            .unwrap();

        assert_eq!(node.name, "branch");
        assert_eq!(node.literals, vec!["x"]);
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[1].children[0].literals, vec!["y"]);
        assert_eq!(node.binds, 1);
        assert_eq!(node.children[1].children[0].binds, 1);
        assert_eq!(built.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_parse_error_constructs_nothing() {
        let built = Arc::new(AtomicUsize::new(0));
        let reg = registry(built.clone());
        for bad in ["(branch (leaf)", "leaf", "(branch ())"] {
            assert!(matches!(reg.make(bad), Err(SshfanError::ParseError { .. })));
        }
        assert_eq!(built.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_plugin_lists_names() {
        let reg = registry(Arc::new(AtomicUsize::new(0)));
        match reg.make("(branch (nope))") {
            Err(SshfanError::UnknownPlugin {
                family,
                name,
                known,
            }) => {
                assert_eq!(family, Family::Filter);
                assert_eq!(name, "nope");
                assert_eq!(known, vec!["branch", "leaf"]);
            }
            other => panic!("unexpected: {:?}", other.map(|n| n.to_string())),
        }
    }

    #[test]
    fn test_unknown_plugin_message() {
        let reg = registry(Arc::new(AtomicUsize::new(0)));
        let err = reg.make("(nope)").err().unwrap();
        assert_eq!(
            err.to_string(),
            "filter \"nope\" is not known (supported: branch, leaf)"
        );
    }

    #[test]
    fn test_argument_helpers() {
        let args: Vec<Arg<Node>> = vec![Arg::Literal("a".into())];
        assert!(require_arguments("p", 1, &args).is_ok());
        assert!(matches!(
            require_no_arguments("p", &args),
            Err(SshfanError::ArgumentCount { got: 1, .. })
        ));
        assert!(matches!(
            children("p", args),
            Err(SshfanError::ArgumentType { .. })
        ));

        let child: Arg<Node> = Arg::Child(Node::default());
        assert!(matches!(literal("p", child), Err(SshfanError::ArgumentType { .. })));
        assert_eq!(literal::<Node>("p", Arg::Literal("us-east-1".into())).unwrap(), "us-east-1");
    }

    #[test]
    fn test_single_takes_the_only_argument() {
        let one: Vec<Arg<Node>> = vec![Arg::Literal("eu-west-1".into())];
        assert!(matches!(single("p", one), Ok(Arg::Literal(text)) if text == "eu-west-1"));

        assert!(matches!(
            single::<Node>("p", Vec::new()),
            Err(SshfanError::ArgumentCount { got: 0, .. })
        ));
        let two: Vec<Arg<Node>> = vec![Arg::Literal("a".into()), Arg::Literal("b".into())];
        assert!(matches!(single("p", two), Err(SshfanError::ArgumentCount { got: 2, .. })));
    }
}
