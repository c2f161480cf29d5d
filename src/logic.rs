//! The logical data model: terms, literals, logical functions, axioms.
//!
//! A [`LogicalFunction`] is a tree of operator nodes whose leaves are
//! [`Literal`]s, with an optional parameter string used by the cost-based
//! distance provider and the postponement table. Axioms are named
//! functions with a stable [`AxiomId`].
//!
//! The binary layout (used by the axiom store) encodes literals against
//! the arity registry: a literal carries its `ArityId` on disk, never the
//! arity text.

use serde::{Deserialize, Serialize};

use crate::arity::{Arity, ArityRegistry};
use crate::codec::{self, ByteReader};
use crate::error::{CodecError, CodecResult};

/// A term symbol inside a literal; opaque beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Term(String);

impl Term {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Term {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A literal: predicate arity, argument terms, optional negation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Literal {
    pub arity: Arity,
    pub terms: Vec<Term>,
    pub negated: bool,
}

impl Literal {
    /// Positive literal; the arity is derived from the predicate name and
    /// the number of terms.
    pub fn new(predicate: &str, terms: impl IntoIterator<Item = Term>) -> Self {
        let terms: Vec<Term> = terms.into_iter().collect();
        Self {
            arity: Arity::from_parts(predicate, terms.len()),
            terms,
            negated: false,
        }
    }

    pub fn negated(predicate: &str, terms: impl IntoIterator<Item = Term>) -> Self {
        let mut lit = Self::new(predicate, terms);
        lit.negated = true;
        lit
    }

    fn write_binary(&self, registry: &mut ArityRegistry, buf: &mut Vec<u8>) {
        let id = registry.add(&self.arity);
        codec::put_u32(buf, id.get());
        codec::put_u8(buf, self.negated as u8);
        codec::put_u16(buf, self.terms.len() as u16);
        for t in &self.terms {
            codec::put_str(buf, t.as_str());
        }
    }

    fn read_binary(r: &mut ByteReader<'_>, registry: &ArityRegistry) -> CodecResult<Self> {
        let raw = r.u32()?;
        let arity = crate::arity::ArityId::new(raw)
            .and_then(|id| registry.arity_of(id))
            .ok_or(CodecError::UnknownArityId { id: raw })?
            .clone();
        let negated = r.u8()? != 0;
        let n = r.u16()? as usize;
        let mut terms = Vec::with_capacity(n);
        for _ in 0..n {
            terms.push(Term::new(r.string()?));
        }
        Ok(Self {
            arity,
            terms,
            negated,
        })
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negated {
            write!(f, "!")?;
        }
        write!(f, "{}(", self.arity.predicate())?;
        for (i, t) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{t}")?;
        }
        write!(f, ")")
    }
}

/// Operator of a logical-function node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    And,
    Or,
    Imply,
    Inconsistent,
    Literal,
}

impl Op {
    fn tag(self) -> u8 {
        match self {
            Op::And => 0x01,
            Op::Or => 0x02,
            Op::Imply => 0x03,
            Op::Inconsistent => 0x04,
            Op::Literal => 0x05,
        }
    }

    fn from_tag(tag: u8, offset: usize) -> CodecResult<Self> {
        Ok(match tag {
            0x01 => Op::And,
            0x02 => Op::Or,
            0x03 => Op::Imply,
            0x04 => Op::Inconsistent,
            0x05 => Op::Literal,
            _ => return Err(CodecError::UnknownTag { tag, offset }),
        })
    }
}

/// A tree of operator nodes with literal leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalFunction {
    pub op: Op,
    children: Vec<LogicalFunction>,
    literal: Option<Literal>,
    param: String,
}

impl LogicalFunction {
    /// Leaf node wrapping a literal.
    pub fn literal(lit: Literal) -> Self {
        Self {
            op: Op::Literal,
            children: Vec::new(),
            literal: Some(lit),
            param: String::new(),
        }
    }

    /// Conjunction of child functions.
    pub fn and(children: Vec<LogicalFunction>) -> Self {
        Self {
            op: Op::And,
            children,
            literal: None,
            param: String::new(),
        }
    }

    /// Disjunction of child functions.
    pub fn or(children: Vec<LogicalFunction>) -> Self {
        Self {
            op: Op::Or,
            children,
            literal: None,
            param: String::new(),
        }
    }

    /// Implication `lhs ⇒ rhs`.
    pub fn imply(lhs: LogicalFunction, rhs: LogicalFunction) -> Self {
        Self {
            op: Op::Imply,
            children: vec![lhs, rhs],
            literal: None,
            param: String::new(),
        }
    }

    /// Mutual inconsistency of two literals.
    pub fn inconsistent(a: Literal, b: Literal) -> Self {
        Self {
            op: Op::Inconsistent,
            children: vec![Self::literal(a), Self::literal(b)],
            literal: None,
            param: String::new(),
        }
    }

    /// Attach a parameter string to this node.
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = param.into();
        self
    }

    pub fn is_op(&self, op: Op) -> bool {
        self.op == op
    }

    pub fn param(&self) -> &str {
        &self.param
    }

    pub fn branches(&self) -> &[LogicalFunction] {
        &self.children
    }

    pub fn branch(&self, i: usize) -> Option<&LogicalFunction> {
        self.children.get(i)
    }

    /// The literal of a leaf node.
    pub fn as_literal(&self) -> Option<&Literal> {
        self.literal.as_ref()
    }

    /// All literals of the tree, depth-first.
    pub fn literals(&self) -> Vec<&Literal> {
        let mut out = Vec::new();
        self.collect_literals(&mut out);
        out
    }

    fn collect_literals<'a>(&'a self, out: &mut Vec<&'a Literal>) {
        if let Some(lit) = &self.literal {
            out.push(lit);
        }
        for c in &self.children {
            c.collect_literals(out);
        }
    }

    /// Literals of the antecedent of an implication; empty otherwise.
    pub fn lhs_literals(&self) -> Vec<&Literal> {
        if self.op == Op::Imply {
            self.branch(0).map(|b| b.literals()).unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    /// Literals of the consequent of an implication; empty otherwise.
    pub fn rhs_literals(&self) -> Vec<&Literal> {
        if self.op == Op::Imply {
            self.branch(1).map(|b| b.literals()).unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    /// Encode this tree, interning every literal arity into `registry`.
    pub fn write_binary(&self, registry: &mut ArityRegistry, buf: &mut Vec<u8>) {
        codec::put_u8(buf, self.op.tag());
        if let Some(lit) = &self.literal {
            lit.write_binary(registry, buf);
        } else {
            codec::put_u16(buf, self.children.len() as u16);
            for c in &self.children {
                c.write_binary(registry, buf);
            }
        }
        codec::put_str(buf, &self.param);
    }

    /// Decode a tree written by [`write_binary`](Self::write_binary).
    pub fn read_binary(r: &mut ByteReader<'_>, registry: &ArityRegistry) -> CodecResult<Self> {
        let offset = r.pos();
        let op = Op::from_tag(r.u8()?, offset)?;
        let (children, literal) = if op == Op::Literal {
            (Vec::new(), Some(Literal::read_binary(r, registry)?))
        } else {
            let n = r.u16()? as usize;
            let mut children = Vec::with_capacity(n);
            for _ in 0..n {
                children.push(Self::read_binary(r, registry)?);
            }
            (children, None)
        };
        let param = r.string()?;
        Ok(Self {
            op,
            children,
            literal,
            param,
        })
    }
}

/// Identifier of an axiom within one compiled knowledge base; 0-based,
/// assigned in insertion order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct AxiomId(pub u32);

impl AxiomId {
    pub fn get(self) -> u32 {
        self.0
    }

    /// Encode a list of ids as `count: u64` then `count × u32`.
    pub fn encode_list<'a>(ids: impl ExactSizeIterator<Item = &'a AxiomId>) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + ids.len() * 4);
        codec::put_u64(&mut buf, ids.len() as u64);
        for id in ids {
            codec::put_u32(&mut buf, id.0);
        }
        buf
    }

    /// Decode a list written by [`encode_list`](Self::encode_list).
    pub fn decode_list(bytes: &[u8]) -> CodecResult<Vec<AxiomId>> {
        let mut r = ByteReader::new(bytes);
        let n = r.u64()? as usize;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(AxiomId(r.u32()?));
        }
        Ok(out)
    }
}

impl std::fmt::Display for AxiomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ax:{}", self.0)
    }
}

/// A named logical formula in the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axiom {
    pub id: AxiomId,
    pub name: String,
    pub func: LogicalFunction,
}

impl Axiom {
    /// The `#`-delimited groups this axiom belongs to: every non-last
    /// segment of the name.
    pub fn groups(&self) -> Vec<&str> {
        let parts: Vec<&str> = self.name.split('#').collect();
        if parts.len() > 1 {
            parts[..parts.len() - 1].to_vec()
        } else {
            Vec::new()
        }
    }

    /// Encode an axiom record: function, id, name.
    pub fn write_binary(&self, registry: &mut ArityRegistry, buf: &mut Vec<u8>) {
        self.func.write_binary(registry, buf);
        codec::put_u32(buf, self.id.0);
        codec::put_str(buf, &self.name);
    }

    /// Decode a record written by [`write_binary`](Self::write_binary).
    pub fn read_binary(r: &mut ByteReader<'_>, registry: &ArityRegistry) -> CodecResult<Self> {
        let func = LogicalFunction::read_binary(r, registry)?;
        let id = AxiomId(r.u32()?);
        let name = r.string()?;
        Ok(Self { id, name, func })
    }
}
