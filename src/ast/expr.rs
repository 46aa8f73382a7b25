//! Expression AST nodes.

use std::fmt;

use crate::ast::stmt::BlockStmt;

/// Expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Integer literal: 42
    IntLiteral(i64),
    /// String literal: "hello"
    StringLiteral(String),
    /// Boolean literal: true, false
    BoolLiteral(bool),
    /// Null literal
    Null,

    /// Identifier reference: foo
    Identifier(String),

    /// Prefix operation: -x, !x
    Prefix { operator: PrefixOp, right: Box<Expr> },

    /// Infix operation: a + b
    Infix {
        left: Box<Expr>,
        operator: InfixOp,
        right: Box<Expr>,
    },

    /// If expression: if (cond) { ... } else { ... }
    ///
    /// Both branches yield a value; a missing alternative yields null.
    If {
        condition: Box<Expr>,
        consequence: BlockStmt,
        alternative: Option<BlockStmt>,
    },

    /// Function literal: fn(a, b) { ... }
    Function {
        parameters: Vec<String>,
        body: BlockStmt,
    },

    /// Call expression: foo(a, b)
    Call {
        function: Box<Expr>,
        arguments: Vec<Expr>,
    },

    /// Array literal: [1, 2, 3]
    Array(Vec<Expr>),

    /// Hash literal: {1: 2, "a": 3}
    Hash(Vec<(Expr, Expr)>),

    /// Index expression: arr[0], hash["key"]
    Index { left: Box<Expr>, index: Box<Expr> },
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    /// Logical not: !x
    Bang,
    /// Arithmetic negation: -x
    Minus,
}

/// Infix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    Gt,
}

impl Expr {
    pub fn integer(value: i64) -> Self {
        Expr::IntLiteral(value)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::StringLiteral(value.into())
    }

    pub fn boolean(value: bool) -> Self {
        Expr::BoolLiteral(value)
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Expr::Identifier(name.into())
    }

    pub fn prefix(operator: PrefixOp, right: Expr) -> Self {
        Expr::Prefix {
            operator,
            right: Box::new(right),
        }
    }

    pub fn infix(left: Expr, operator: InfixOp, right: Expr) -> Self {
        Expr::Infix {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }

    pub fn if_expr(condition: Expr, consequence: BlockStmt, alternative: Option<BlockStmt>) -> Self {
        Expr::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        }
    }

    pub fn function(parameters: &[&str], body: BlockStmt) -> Self {
        Expr::Function {
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
            body,
        }
    }

    pub fn call(function: Expr, arguments: Vec<Expr>) -> Self {
        Expr::Call {
            function: Box::new(function),
            arguments,
        }
    }

    pub fn array(elements: Vec<Expr>) -> Self {
        Expr::Array(elements)
    }

    pub fn hash(pairs: Vec<(Expr, Expr)>) -> Self {
        Expr::Hash(pairs)
    }

    pub fn index(left: Expr, index: Expr) -> Self {
        Expr::Index {
            left: Box::new(left),
            index: Box::new(index),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::IntLiteral(value) => write!(f, "{}", value),
            Expr::StringLiteral(value) => write!(f, "{}", value),
            Expr::BoolLiteral(value) => write!(f, "{}", value),
            Expr::Null => write!(f, "null"),
            Expr::Identifier(name) => write!(f, "{}", name),
            Expr::Prefix { operator, right } => write!(f, "({}{})", operator, right),
            Expr::Infix {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
            Expr::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if {} {}", condition, consequence)?;
                if let Some(alternative) = alternative {
                    write!(f, " else {}", alternative)?;
                }
                Ok(())
            }
            Expr::Function { parameters, body } => {
                write!(f, "fn({}) {}", parameters.join(", "), body)
            }
            Expr::Call {
                function,
                arguments,
            } => {
                let args: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", function, args.join(", "))
            }
            Expr::Array(elements) => {
                let elems: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", elems.join(", "))
            }
            Expr::Hash(pairs) => {
                let pairs: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}:{}", k, v))
                    .collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Expr::Index { left, index } => write!(f, "({}[{}])", left, index),
        }
    }
}

impl fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefixOp::Bang => write!(f, "!"),
            PrefixOp::Minus => write!(f, "-"),
        }
    }
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            InfixOp::Add => "+",
            InfixOp::Sub => "-",
            InfixOp::Mul => "*",
            InfixOp::Div => "/",
            InfixOp::Eq => "==",
            InfixOp::NotEq => "!=",
            InfixOp::Lt => "<",
            InfixOp::Gt => ">",
        };
        write!(f, "{}", op)
    }
}
