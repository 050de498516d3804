// Copyright (c) The Diem Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use petgraph::{
    graph::{Graph, NodeIndex},
    visit::Bfs,
};
use std::{collections::HashMap, rc::Rc};

use crate::sym_typing::ExpTy;

/// Basic block id, the index of the block within its function
pub type BlockId = usize;

/// Unary SSA operators. Anything outside minus and logical not has no
/// symbolic counterpart and passes its operand through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsaUnOp {
    Neg,
    Not,
    BitNot,
}

/// Binary SSA operators. The bitwise and shift group is carried so that
/// front-ends can hand over full functions; the interpreter skips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsaBinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl SsaBinOp {
    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            SsaBinOp::BitAnd | SsaBinOp::BitOr | SsaBinOp::BitXor | SsaBinOp::Shl | SsaBinOp::Shr
        )
    }
}

/// An operand: a reference to a named instruction or parameter, or a literal
#[derive(Debug, Clone, PartialEq)]
pub enum SsaValue {
    Name(String),
    IntLit(i64),
    BoolLit(bool),
    FloatLit(f64),
    StrLit(String),
}

impl SsaValue {
    pub fn name(name: impl Into<String>) -> Self {
        SsaValue::Name(name.into())
    }
}

/// What gets allocated by an `Alloc` instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocKind {
    /// Single-cell allocation of a scalar kind
    Cell(ExpTy),
    /// Struct with the given number of fields
    Struct(u32),
    /// Array of the given length
    Array(u32),
}

/// Instruction shapes of the generic SSA form consumed by the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum SsaOp {
    UnOp {
        op: SsaUnOp,
        operand: SsaValue,
    },
    BinOp {
        op: SsaBinOp,
        lhs: SsaValue,
        rhs: SsaValue,
    },
    Load {
        addr: SsaValue,
    },
    Store {
        addr: SsaValue,
        value: SsaValue,
    },
    Alloc {
        kind: AllocKind,
    },
    FieldAddr {
        base: SsaValue,
        field: u32,
    },
    Field {
        base: SsaValue,
        field: u32,
    },
    IndexAddr {
        base: SsaValue,
        index: SsaValue,
    },
    Index {
        base: SsaValue,
        index: SsaValue,
    },
    /// Control-flow join: one value per predecessor block
    Phi {
        edges: Vec<(BlockId, SsaValue)>,
    },
    /// Call into a foreign function, abstracted as a fresh symbolic value
    Call {
        callee: String,
        args: Vec<SsaValue>,
    },
    ChangeType {
        operand: SsaValue,
    },
    Convert {
        operand: SsaValue,
    },
    MakeInterface {
        operand: SsaValue,
    },
    /// Two-way branch; successors come from the enclosing block
    If {
        cond: SsaValue,
    },
    /// Unconditional jump to the block's single successor
    Jump,
    Return {
        result: Option<SsaValue>,
    },
}

impl SsaOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            SsaOp::UnOp { .. } => "unop",
            SsaOp::BinOp { .. } => "binop",
            SsaOp::Load { .. } => "load",
            SsaOp::Store { .. } => "store",
            SsaOp::Alloc { .. } => "alloc",
            SsaOp::FieldAddr { .. } => "fieldaddr",
            SsaOp::Field { .. } => "field",
            SsaOp::IndexAddr { .. } => "indexaddr",
            SsaOp::Index { .. } => "index",
            SsaOp::Phi { .. } => "phi",
            SsaOp::Call { .. } => "call",
            SsaOp::ChangeType { .. } => "changetype",
            SsaOp::Convert { .. } => "convert",
            SsaOp::MakeInterface { .. } => "makeinterface",
            SsaOp::If { .. } => "if",
            SsaOp::Jump => "jump",
            SsaOp::Return { .. } => "return",
        }
    }
}

/// One instruction: an optional SSA name, a static type, and a shape
#[derive(Debug, Clone, PartialEq)]
pub struct SsaInstr {
    pub name: String,
    pub ty: ExpTy,
    pub op: SsaOp,
}

/// Function parameter with its declared semantic type
#[derive(Debug, Clone, PartialEq)]
pub struct SsaParam {
    pub name: String,
    pub ty: ExpTy,
}

/// Basic block: ordered instructions plus an ordered successor list
#[derive(Debug, Clone, PartialEq)]
pub struct SsaBlock {
    pub instrs: Vec<SsaInstr>,
    pub succs: Vec<BlockId>,
}

impl SsaBlock {
    fn new() -> Self {
        Self {
            instrs: Vec::new(),
            succs: Vec::new(),
        }
    }

    pub fn has_return(&self) -> bool {
        self.instrs
            .iter()
            .any(|instr| matches!(instr.op, SsaOp::Return { .. }))
    }
}

/// An SSA function assembled by a front-end. Block 0 is the entry block.
#[derive(Debug, Clone)]
pub struct SsaFunction {
    name: String,
    params: Vec<SsaParam>,
    blocks: Vec<SsaBlock>,
    defs: HashMap<String, (BlockId, usize)>,
}

impl SsaFunction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            blocks: Vec::new(),
            defs: HashMap::new(),
        }
    }

    pub fn add_param(&mut self, name: impl Into<String>, ty: ExpTy) -> &mut Self {
        self.params.push(SsaParam {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn add_block(&mut self) -> BlockId {
        self.blocks.push(SsaBlock::new());
        self.blocks.len() - 1
    }

    pub fn set_succs(&mut self, block: BlockId, succs: &[BlockId]) -> &mut Self {
        self.blocks[block].succs = succs.to_vec();
        self
    }

    /// Append an instruction; a non-empty name registers the definition
    pub fn push(&mut self, block: BlockId, name: impl Into<String>, ty: ExpTy, op: SsaOp) {
        let name = name.into();
        let index = self.blocks[block].instrs.len();
        if !name.is_empty() {
            self.defs.insert(name.clone(), (block, index));
        }
        self.blocks[block].instrs.push(SsaInstr { name, ty, op });
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[SsaParam] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&SsaParam> {
        self.params.iter().find(|param| param.name == name)
    }

    pub fn blocks(&self) -> &[SsaBlock] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> Option<&SsaBlock> {
        self.blocks.get(id)
    }

    /// The instruction defining a named SSA value, if any
    pub fn def_of(&self, name: &str) -> Option<&SsaInstr> {
        let (block, index) = self.defs.get(name)?;
        self.blocks.get(*block)?.instrs.get(*index)
    }

    /// The control-flow graph as a generic graph, so the crate can lean on
    /// the visitation algorithms in petgraph
    pub fn block_graph(&self) -> (Graph<BlockId, ()>, HashMap<BlockId, NodeIndex>) {
        let mut graph = Graph::new();
        let node_map: HashMap<BlockId, NodeIndex> = (0..self.blocks.len())
            .map(|id| (id, graph.add_node(id)))
            .collect();
        for (id, block) in self.blocks.iter().enumerate() {
            for succ in &block.succs {
                if let Some(succ_node) = node_map.get(succ) {
                    graph.add_edge(node_map[&id], *succ_node, ());
                }
            }
        }
        (graph, node_map)
    }

    /// Breadth-first search from a saturated loop header for the block to
    /// resume at: the first block reached (header excluded) that either
    /// returns or does not flow back into the header.
    pub fn find_loop_exit(&self, header: BlockId) -> Option<BlockId> {
        let (graph, node_map) = self.block_graph();
        let start = *node_map.get(&header)?;
        let mut bfs = Bfs::new(&graph, start);
        while let Some(node) = bfs.next(&graph) {
            let block_id = graph[node];
            if block_id == header {
                continue;
            }
            let block = &self.blocks[block_id];
            if block.has_return() || !block.succs.contains(&header) {
                return Some(block_id);
            }
        }
        None
    }
}

/// A set of functions under analysis, looked up by name
#[derive(Debug, Clone, Default)]
pub struct SsaProgram {
    functions: HashMap<String, Rc<SsaFunction>>,
}

impl SsaProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, function: SsaFunction) {
        self.functions
            .insert(function.name().to_owned(), Rc::new(function));
    }

    pub fn get_function(&self, name: &str) -> Option<Rc<SsaFunction>> {
        self.functions.get(name).cloned()
    }
}
