use {
    crate::{
        ast::{Ast, BinaryOperator, NodeId, NodeKind, VarType},
        codetable::{memory, CodeTable, Label, LoopLabels, LoopStack},
        error::{CompileError, SemanticError},
        registers::{PoolKind, Register, RegisterPool, StackTraffic, ARG_REGISTER_COUNT, POOL_SIZE},
        storage::{StorageAllocator, CALL_SAVE_BYTES, MAX_PARAMS, SAVED_REGISTER_BYTES},
        symtab::{Shape, SymbolEntry, SymbolKind, SymbolTableStack},
    },
    tracing::{debug, instrument},
};

type GenResult<T> = Result<T, CompileError>;

pub const NEWLINE_LABEL: &str = "_newline_";

fn load_mnemonic(var_type: VarType) -> &'static str {
    match var_type {
        VarType::Int => "lw",
        VarType::Char => "lb",
    }
}

fn store_mnemonic(var_type: VarType) -> &'static str {
    match var_type {
        VarType::Int => "sw",
        VarType::Char => "sb",
    }
}

fn binary_mnemonic(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Eq => "seq",
        BinaryOperator::Ne => "sne",
        BinaryOperator::Less => "slt",
        BinaryOperator::LessEq => "sle",
        BinaryOperator::Greater => "sgt",
        BinaryOperator::GreaterEq => "sge",
        BinaryOperator::Add => "add",
        BinaryOperator::Subtract => "sub",
        BinaryOperator::Multiply => "mulo",
        BinaryOperator::Divide => "div",
        BinaryOperator::Or => "or",
        BinaryOperator::And => "and",
    }
}

/// Everything the tree walk needs to remember between nodes.
pub struct CodeGenerator<'a> {
    ast: &'a Ast,
    symbols: SymbolTableStack,
    storage: StorageAllocator,
    temps: RegisterPool,
    locals: RegisterPool,
    code: CodeTable,

    /// Frame offset at entry to each enclosing block, innermost last.
    offsets: Vec<i32>,
    loops: LoopStack,

    /// Line of a `break` that still needs its branch emitted.
    pending_break: Option<u32>,

    /// Whether the current function has a `return` anywhere in it.
    has_returned: bool,
    epilogue: Option<Label>,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(ast: &'a Ast) -> CodeGenerator<'a> {
        CodeGenerator {
            ast,
            symbols: SymbolTableStack::new(),
            storage: StorageAllocator::new(),
            temps: RegisterPool::new(PoolKind::Temporary),
            locals: RegisterPool::new(PoolKind::Local),
            code: CodeTable::new(),
            offsets: vec![],
            loops: LoopStack::default(),
            pending_break: None,
            has_returned: false,
            epilogue: None,
        }
    }

    pub fn into_code(self) -> CodeTable {
        self.code
    }

    fn error(&self, node: NodeId, kind: SemanticError) -> CompileError {
        CompileError::semantic(self.ast.line(node), kind)
    }

    fn malformed(&self, node: NodeId, what: &'static str) -> CompileError {
        self.error(node, SemanticError::MalformedTree(what))
    }

    fn acquire(&mut self, kind: PoolKind) -> Register {
        let (reg, traffic) = match kind {
            PoolKind::Temporary => self.temps.acquire(),
            PoolKind::Local => self.locals.acquire(),
        };

        if let Some(StackTraffic::Spill(spilled)) = traffic {
            self.code.addiu(Register::Sp, Register::Sp, -4);
            self.code.op2("sw", spilled, memory(0, Register::Sp));
            self.storage.push(4);
        }

        reg
    }

    fn release(&mut self, reg: Register) {
        let traffic = match reg {
            Register::Temp(_) => self.temps.release(reg),
            Register::Saved(_) => self.locals.release(reg),
            _ => None,
        };

        if let Some(StackTraffic::Restore(restored)) = traffic {
            self.code.op2("lw", restored, memory(0, Register::Sp));
            self.code.addiu(Register::Sp, Register::Sp, 4);
            self.storage.pop(4);
        }
    }

    fn lookup(&self, name: &str, node: NodeId) -> GenResult<SymbolEntry> {
        self.symbols.lookup(name, self.ast.line(node)).map(|entry| entry.clone())
    }

    /// Type, name and shape of a variable or parameter declaration.
    fn declaration(&self, decl: NodeId) -> GenResult<(VarType, &'a str, Shape)> {
        let ast = self.ast;
        let children = ast.children(decl);

        let var_type = match children.first().map(|child| ast.kind(*child)) {
            Some(NodeKind::Type(var_type)) => *var_type,
            _ => return Err(self.malformed(decl, "declaration type")),
        };

        let name = children
            .get(1)
            .and_then(|child| ast.ident_name(*child))
            .ok_or_else(|| self.malformed(decl, "declaration name"))?;

        let shape = match children.len() {
            2 => Shape::Scalar,
            4 => Shape::ArrayParam,
            5 => match ast.kind(children[3]) {
                NodeKind::Num(size) if *size > 0 => Shape::Array(*size as u32),
                NodeKind::Num(_) => {
                    let kind = SemanticError::InvalidArraySize(String::from(name));
                    return Err(self.error(decl, kind));
                }
                _ => return Err(self.malformed(decl, "array size")),
            },
            _ => return Err(self.malformed(decl, "declaration")),
        };

        Ok((var_type, name, shape))
    }

    #[instrument(level = "debug", skip_all)]
    pub fn generate_program(&mut self, root: NodeId) -> GenResult<()> {
        if *self.ast.kind(root) != NodeKind::Program {
            return Err(self.malformed(root, "program"));
        }

        self.code.op0(".data");
        self.code.place_label(&Label::named(NEWLINE_LABEL));
        self.code.op1(".asciiz", "\"\\n\"");
        self.code.op0(".text");
        self.code.op1(".globl", "main");

        let ast = self.ast;
        for child in ast.children(root).iter() {
            match ast.kind(*child) {
                NodeKind::VarDecl => self.global_declaration(*child)?,
                NodeKind::FuncDecl => self.function(*child)?,
                _ => return Err(self.malformed(*child, "top-level declaration")),
            }
        }

        Ok(())
    }

    fn global_declaration(&mut self, decl: NodeId) -> GenResult<()> {
        let (var_type, name, shape) = self.declaration(decl)?;
        let offset = self
            .storage
            .allocate_global(var_type, shape)
            .ok_or_else(|| self.error(decl, SemanticError::TooLarge(String::from(name))))?;
        let line = self.ast.line(decl);
        self.symbols
            .declare_variable(name, var_type, shape, offset, shape.is_array(), line)?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    fn function(&mut self, func: NodeId) -> GenResult<()> {
        let ast = self.ast;
        let children = ast.children(func);
        if children.len() < 3 {
            return Err(self.malformed(func, "function"));
        }

        let (return_type, name) = self.declaration_head(func)?;
        let block = children[children.len() - 1];
        if *ast.kind(block) != NodeKind::Block {
            return Err(self.malformed(func, "function body"));
        }

        let params = &children[2..children.len() - 1];
        if params.len() > MAX_PARAMS {
            return Err(self.error(
                func,
                SemanticError::TooManyParameters {
                    name: String::from(name),
                    count: params.len(),
                    max: MAX_PARAMS,
                },
            ));
        }

        debug!(name, params = params.len(), "function");

        // Declared before the body so the function can call itself.
        let handle = self.symbols.declare_function(name, return_type, ast.line(func))?;
        self.symbols.set_param_count(handle, params.len());

        self.storage.begin_function();
        self.temps.reset();
        self.locals.reset();

        self.code.place_label(&Label::named(name));
        self.symbols.push_scope();

        for (i, param) in params.iter().enumerate() {
            if *ast.kind(*param) != NodeKind::Param {
                return Err(self.malformed(*param, "parameter"));
            }

            let (var_type, param_name, shape) = self.declaration(*param)?;
            let offset = self.storage.allocate_param(var_type, shape.is_array());
            let mnemonic = if shape.is_array() { "sw" } else { store_mnemonic(var_type) };

            // $sp still holds what becomes $fp once the prologue runs.
            self.code.op2(mnemonic, Register::Arg(i as u8), memory(offset, Register::Sp));
            self.symbols
                .declare_variable(param_name, var_type, shape, offset, true, ast.line(*param))?;
        }

        let param_bytes = self.storage.finish_params();
        self.function_prologue(param_bytes);

        let epilogue = self.code.new_label("");
        self.epilogue = Some(epilogue.clone());
        self.has_returned = false;

        self.block(block)?;
        debug!(name, returned = self.has_returned, "function body done");

        self.function_epilogue(&epilogue, param_bytes);
        self.symbols.pop_scope();
        self.epilogue = None;
        self.temps.reset();
        self.locals.reset();
        Ok(())
    }

    /// Type and name of a function declaration.
    fn declaration_head(&self, decl: NodeId) -> GenResult<(VarType, &'a str)> {
        let ast = self.ast;
        let children = ast.children(decl);
        match (
            children.first().map(|child| ast.kind(*child)),
            children.get(1).and_then(|child| ast.ident_name(*child)),
        ) {
            (Some(NodeKind::Type(var_type)), Some(name)) => Ok((*var_type, name)),
            _ => Err(self.malformed(decl, "declaration")),
        }
    }

    fn function_prologue(&mut self, param_bytes: i32) {
        if param_bytes > 0 {
            self.code.addiu(Register::Sp, Register::Sp, -param_bytes);
        }

        self.code.addiu(Register::Sp, Register::Sp, -SAVED_REGISTER_BYTES);
        self.code.op2("sw", Register::Ra, memory(36, Register::Sp));
        self.code.op2("sw", Register::Fp, memory(32, Register::Sp));
        for n in 0..POOL_SIZE {
            self.code
                .op2("sw", Register::Saved(n as u8), memory(28 - 4 * n as i32, Register::Sp));
        }

        self.code
            .addiu(Register::Fp, Register::Sp, param_bytes + SAVED_REGISTER_BYTES);
        self.storage.enter_body();
    }

    fn function_epilogue(&mut self, epilogue: &Label, param_bytes: i32) {
        self.code.place_label(epilogue);

        // A return may leave the stack pointer anywhere inside the frame, so start over from $fp.
        self.code
            .addiu(Register::Sp, Register::Fp, -(param_bytes + SAVED_REGISTER_BYTES));
        for n in (0..POOL_SIZE).rev() {
            self.code
                .op2("lw", Register::Saved(n as u8), memory(28 - 4 * n as i32, Register::Sp));
        }
        self.code.op2("lw", Register::Fp, memory(32, Register::Sp));
        self.code.op2("lw", Register::Ra, memory(36, Register::Sp));
        self.code.addiu(Register::Sp, Register::Sp, SAVED_REGISTER_BYTES);
        if param_bytes > 0 {
            self.code.addiu(Register::Sp, Register::Sp, param_bytes);
        }
        self.code.op1("jr", Register::Ra);
    }

    fn block(&mut self, block: NodeId) -> GenResult<()> {
        let ast = self.ast;
        self.symbols.push_scope();
        let entry_offset = self.storage.enter_block();
        self.offsets.push(entry_offset);

        let children = ast.children(block);
        let declaration_count = children
            .iter()
            .take_while(|child| *ast.kind(**child) == NodeKind::VarDecl)
            .count();

        for decl in children[..declaration_count].iter() {
            let (var_type, name, shape) = self.declaration(*decl)?;
            let allocation = self
                .storage
                .allocate_local(var_type, shape)
                .ok_or_else(|| self.error(*decl, SemanticError::TooLarge(String::from(name))))?;
            if allocation.bytes > 0 {
                self.code.addiu(Register::Sp, Register::Sp, -allocation.bytes);
            }

            let (offset, line) = (allocation.offset, ast.line(*decl));
            self.symbols
                .declare_variable(name, var_type, shape, offset, shape.is_array(), line)?;
        }

        let padding = self.storage.pad_locals();
        if padding > 0 {
            self.code.addiu(Register::Sp, Register::Sp, -padding);
        }

        for statement in children[declaration_count..].iter() {
            self.statement(*statement)?;

            // Nothing after a break in the same block can run.
            if self.pending_break.is_some() {
                break;
            }
        }

        let entry_offset = self.offsets.pop().unwrap_or(entry_offset);
        let distance = self.storage.exit_block(entry_offset);
        if distance != 0 {
            self.code.addiu(Register::Sp, Register::Sp, distance);
        }
        self.symbols.pop_scope();

        self.flush_break()
    }

    fn flush_break(&mut self) -> GenResult<()> {
        let line = match self.pending_break.take() {
            Some(line) => line,
            None => return Ok(()),
        };

        let innermost = self
            .loops
            .innermost()
            .cloned()
            .ok_or_else(|| CompileError::semantic(line, SemanticError::BreakOutsideLoop))?;

        let distance = self.storage.stack_offset() - innermost.stack_offset;
        if distance != 0 {
            self.code.addiu(Register::Sp, Register::Sp, distance);
        }
        self.code.branch(&innermost.done);
        Ok(())
    }

    fn statement(&mut self, node: NodeId) -> GenResult<()> {
        let ast = self.ast;
        match ast.kind(node) {
            NodeKind::Return => self.return_statement(node),
            NodeKind::Read => self.read_statement(node),
            NodeKind::Write => {
                let operand = ast.child(node, 0).ok_or_else(|| self.malformed(node, "write"))?;
                let value = self.value_of(operand)?;
                self.code.op2("li", Register::V0, 1);
                self.code.op2("move", Register::Arg(0), value);
                self.code.op0("syscall");
                self.release(value);
                Ok(())
            }
            NodeKind::Writeln => {
                self.code.op2("li", Register::V0, 4);
                self.code.op2("la", Register::Arg(0), NEWLINE_LABEL);
                self.code.op0("syscall");
                Ok(())
            }
            NodeKind::Break => {
                self.pending_break = Some(ast.line(node));
                Ok(())
            }
            NodeKind::If => self.if_statement(node),
            NodeKind::While => self.while_statement(node),
            NodeKind::Block => self.block(node),
            NodeKind::VarDecl => Err(self.malformed(node, "statement")),
            _ => {
                if let Some(value) = self.expression(node)? {
                    self.release(value);
                }
                Ok(())
            }
        }
    }

    fn return_statement(&mut self, node: NodeId) -> GenResult<()> {
        let operand = self.ast.child(node, 0).ok_or_else(|| self.malformed(node, "return"))?;
        let value = self.value_of(operand)?;
        self.code.op2("move", Register::V0, value);
        self.release(value);

        // Undo the innermost block's allocations. The epilogue resets the rest of the frame.
        let block_offset = self
            .offsets
            .last()
            .copied()
            .ok_or_else(|| self.malformed(node, "return outside of a block"))?;
        let distance = self.storage.unwind_distance(block_offset);
        if distance != 0 {
            self.code.addiu(Register::Sp, Register::Sp, distance);
        }

        let epilogue = self
            .epilogue
            .clone()
            .ok_or_else(|| self.malformed(node, "return outside of a function"))?;
        self.code.branch(&epilogue);
        self.has_returned = true;
        Ok(())
    }

    fn read_statement(&mut self, node: NodeId) -> GenResult<()> {
        let ast = self.ast;
        let target = ast.child(node, 0).ok_or_else(|| self.malformed(node, "read"))?;
        let name = ast.ident_name(target).ok_or_else(|| self.malformed(node, "read target"))?;
        let entry = self.lookup(name, target)?;

        if entry.is_function() {
            return Err(self.error(target, SemanticError::AssignToFunction(String::from(name))));
        }

        if entry.shape.is_array() {
            return Err(self.error(target, SemanticError::ArrayMisuse(String::from(name))));
        }

        self.code.op2("li", Register::V0, 5);
        self.code.op0("syscall");
        let value = self.acquire(PoolKind::Temporary);
        self.code.op2("move", value, Register::V0);
        self.store_scalar(&entry, value);
        self.release(value);
        self.symbols.mark_initialized(name);
        Ok(())
    }

    fn if_statement(&mut self, node: NodeId) -> GenResult<()> {
        let ast = self.ast;
        let children = ast.children(node);
        let (condition, then_branch, else_node) = match children {
            [condition, else_node] => (*condition, None, *else_node),
            [condition, then_branch, else_node] => (*condition, Some(*then_branch), *else_node),
            _ => return Err(self.malformed(node, "if statement")),
        };

        if *ast.kind(else_node) != NodeKind::Else {
            return Err(self.malformed(node, "if statement without else"));
        }

        let else_label = self.code.new_label("_else");
        let done_label = self.code.new_label("_ifElseDone");

        let value = self.value_of(condition)?;
        self.code.op2("beqz", value, &else_label);
        self.release(value);

        if let Some(then_branch) = then_branch {
            self.statement(then_branch)?;
            self.flush_break()?;
        }
        self.code.branch(&done_label);

        self.code.place_label(&else_label);
        if let Some(else_branch) = ast.child(else_node, 0) {
            self.statement(else_branch)?;
            self.flush_break()?;
        }
        self.code.place_label(&done_label);
        Ok(())
    }

    fn while_statement(&mut self, node: NodeId) -> GenResult<()> {
        let ast = self.ast;
        let condition = ast.child(node, 0).ok_or_else(|| self.malformed(node, "while condition"))?;

        let start = self.code.new_label("_while");
        let done = self.code.new_label("_whileDone");
        self.loops.push(LoopLabels {
            start: start.clone(),
            done: done.clone(),
            stack_offset: self.storage.stack_offset(),
        });
        debug!(depth = self.loops.depth(), label = %start, "loop");

        self.code.place_label(&start);
        let value = self.value_of(condition)?;
        self.code.op2("beqz", value, &done);
        self.release(value);

        if let Some(body) = ast.child(node, 1) {
            self.statement(body)?;
            self.flush_break()?;
        }

        self.code.branch(&start);
        self.code.place_label(&done);
        self.loops.pop();
        Ok(())
    }

    /// Like `expression`, for places where a value is required.
    fn value_of(&mut self, node: NodeId) -> GenResult<Register> {
        match self.expression(node)? {
            Some(reg) => Ok(reg),
            None => Err(self.error(node, SemanticError::AssignmentAsValue)),
        }
    }

    /// Leaves the expression's value in a freshly acquired register. Assignments produce no value.
    fn expression(&mut self, node: NodeId) -> GenResult<Option<Register>> {
        let ast = self.ast;
        match ast.kind(node) {
            NodeKind::Num(val) => {
                let reg = self.acquire(PoolKind::Temporary);
                self.code.op2("li", reg, *val);
                Ok(Some(reg))
            }
            NodeKind::Float(_) => Err(self.error(node, SemanticError::FloatUnsupported)),
            NodeKind::Ident(name) => self.identifier(node, name).map(Some),
            NodeKind::Assign => {
                self.assignment(node)?;
                Ok(None)
            }
            NodeKind::Binary(op) => self.binary(node, *op).map(Some),
            NodeKind::Negate => {
                let operand = ast.child(node, 0).ok_or_else(|| self.malformed(node, "negation"))?;
                let reg = self.value_of(operand)?;
                self.code.op2("neg", reg, reg);
                Ok(Some(reg))
            }
            NodeKind::Not => {
                let operand = ast
                    .child(node, 0)
                    .ok_or_else(|| self.malformed(node, "logical not"))?;
                let reg = self.value_of(operand)?;
                let zero = self.code.new_label("_notZero");
                let done = self.code.new_label("_notDone");
                self.code.op2("beqz", reg, &zero);
                self.code.op2("li", reg, 0);
                self.code.branch(&done);
                self.code.place_label(&zero);
                self.code.op2("li", reg, 1);
                self.code.place_label(&done);
                Ok(Some(reg))
            }
            _ => Err(self.malformed(node, "expression")),
        }
    }

    fn binary(&mut self, node: NodeId, op: BinaryOperator) -> GenResult<Register> {
        let ast = self.ast;
        let (lhs, rhs) = match ast.children(node) {
            [lhs, rhs] => (*lhs, *rhs),
            _ => return Err(self.malformed(node, "binary operator")),
        };

        let left = self.value_of(lhs)?;
        let right = self.value_of(rhs)?;

        match op {
            BinaryOperator::Or => {
                let is_true = self.code.new_label("_orTrue");
                let done = self.code.new_label("_orDone");
                self.code.op2("bnez", left, &is_true);
                self.code.op2("bnez", right, &is_true);
                self.code.op2("li", left, 0);
                self.code.branch(&done);
                self.code.place_label(&is_true);
                self.code.op2("li", left, 1);
                self.code.place_label(&done);
            }
            BinaryOperator::And => {
                let is_false = self.code.new_label("_andFalse");
                let done = self.code.new_label("_andDone");
                self.code.op2("beqz", left, &is_false);
                self.code.op2("beqz", right, &is_false);
                self.code.op2("li", left, 1);
                self.code.branch(&done);
                self.code.place_label(&is_false);
                self.code.op2("li", left, 0);
                self.code.place_label(&done);
            }
            _ => self.code.op3(binary_mnemonic(op), left, left, right),
        }

        self.release(right);
        Ok(left)
    }

    fn identifier(&mut self, node: NodeId, name: &str) -> GenResult<Register> {
        let ast = self.ast;
        let entry = self.lookup(name, node)?;
        let children = ast.children(node);

        let args = children
            .first()
            .filter(|child| *ast.kind(**child) == NodeKind::ExprList);
        if let Some(args) = args {
            return self.call(node, &entry, *args);
        }

        if entry.is_function() {
            return Err(self.error(node, SemanticError::FunctionWithoutCall(String::from(name))));
        }

        if let [_, index, _] = children {
            if !entry.shape.is_array() {
                return Err(self.error(node, SemanticError::NotAnArray(String::from(name))));
            }

            let address = self.element_address(&entry, *index)?;
            self.code
                .op2(load_mnemonic(entry.var_type), address, memory(0, address));
            return Ok(address);
        }

        let reg = self.acquire(PoolKind::Temporary);
        if entry.shape.is_array() {
            // A bare array name evaluates to its address.
            self.array_base(&entry, reg);
            return Ok(reg);
        }

        if !entry.initialized {
            self.release(reg);
            return Err(self.error(node, SemanticError::Uninitialized(String::from(name))));
        }

        let base = if entry.is_global() { Register::Gp } else { Register::Fp };
        self.code
            .op2(load_mnemonic(entry.var_type), reg, memory(entry.offset, base));
        Ok(reg)
    }

    fn array_base(&mut self, entry: &SymbolEntry, reg: Register) {
        match (entry.is_global(), entry.shape) {
            (true, _) => self.code.op2("la", reg, memory(entry.offset, Register::Gp)),
            (false, Shape::ArrayParam) => {
                self.code.op2("lw", reg, memory(entry.offset, Register::Fp))
            }
            (false, _) => self.code.op2("la", reg, memory(entry.offset, Register::Fp)),
        }
    }

    /// Address of `entry[index]`: index * element size + base.
    fn element_address(&mut self, entry: &SymbolEntry, index: NodeId) -> GenResult<Register> {
        let address = self.value_of(index)?;
        let scratch = self.acquire(PoolKind::Temporary);
        self.code.op2("li", scratch, entry.var_type.size());
        self.code.op3("mulo", address, address, scratch);
        self.array_base(entry, scratch);
        self.code.op3("add", address, scratch, address);
        self.release(scratch);
        Ok(address)
    }

    fn call(&mut self, node: NodeId, entry: &SymbolEntry, args: NodeId) -> GenResult<Register> {
        let ast = self.ast;
        let param_count = match entry.kind {
            SymbolKind::Function { param_count } => param_count,
            SymbolKind::Variable => {
                return Err(self.error(node, SemanticError::NotAFunction(entry.name.clone())))
            }
        };

        let args = ast.children(args);
        if args.len() > MAX_PARAMS {
            return Err(self.error(
                node,
                SemanticError::TooManyParameters {
                    name: entry.name.clone(),
                    count: args.len(),
                    max: MAX_PARAMS,
                },
            ));
        }

        if args.len() != param_count {
            return Err(self.error(
                node,
                SemanticError::ArityMismatch {
                    name: entry.name.clone(),
                    expected: param_count,
                    found: args.len(),
                },
            ));
        }

        let result = self.acquire(PoolKind::Temporary);
        self.save_caller_registers();

        for (i, arg) in args.iter().enumerate() {
            let value = self.value_of(*arg)?;
            self.code.op2("move", Register::Arg(i as u8), value);
            self.release(value);
        }

        self.code.op1("jal", &entry.name);
        self.restore_caller_registers();
        self.code.op2("move", result, Register::V0);
        Ok(result)
    }

    fn caller_saved_slots() -> impl Iterator<Item = (Register, i32)> {
        let temps = (0..POOL_SIZE)
            .map(|n| (Register::Temp(n as u8), CALL_SAVE_BYTES - 4 - 4 * n as i32));
        let args = (0..ARG_REGISTER_COUNT)
            .map(|n| (Register::Arg(n as u8), 4 * (ARG_REGISTER_COUNT - 1 - n) as i32));
        temps.chain(args)
    }

    fn save_caller_registers(&mut self) {
        self.code.addiu(Register::Sp, Register::Sp, -CALL_SAVE_BYTES);
        self.storage.push(CALL_SAVE_BYTES);
        for (reg, offset) in Self::caller_saved_slots() {
            self.code.op2("sw", reg, memory(offset, Register::Sp));
        }
    }

    fn restore_caller_registers(&mut self) {
        for (reg, offset) in Self::caller_saved_slots() {
            self.code.op2("lw", reg, memory(offset, Register::Sp));
        }
        self.code.addiu(Register::Sp, Register::Sp, CALL_SAVE_BYTES);
        self.storage.pop(CALL_SAVE_BYTES);
    }

    fn assignment(&mut self, node: NodeId) -> GenResult<()> {
        let ast = self.ast;
        let (target, value_node) = match ast.children(node) {
            [target, value] => (*target, *value),
            _ => return Err(self.malformed(node, "assignment")),
        };

        let name = ast
            .ident_name(target)
            .ok_or_else(|| self.error(target, SemanticError::InvalidAssignmentTarget))?;
        let entry = self.lookup(name, target)?;

        if entry.is_function() {
            return Err(self.error(target, SemanticError::AssignToFunction(String::from(name))));
        }

        let value = self.value_of(value_node)?;

        match ast.children(target) {
            [] if entry.shape.is_array() => {
                return Err(self.error(target, SemanticError::ArrayMisuse(String::from(name))));
            }
            [] => self.store_scalar(&entry, value),
            [_, index, _] => {
                if !entry.shape.is_array() {
                    return Err(self.error(target, SemanticError::NotAnArray(String::from(name))));
                }

                let address = self.element_address(&entry, *index)?;
                self.code
                    .op2(store_mnemonic(entry.var_type), value, memory(0, address));
                self.release(address);
            }
            _ => return Err(self.error(target, SemanticError::InvalidAssignmentTarget)),
        }

        self.release(value);
        self.symbols.mark_initialized(name);
        Ok(())
    }

    fn store_scalar(&mut self, entry: &SymbolEntry, value: Register) {
        let mnemonic = store_mnemonic(entry.var_type);
        if entry.is_global() {
            self.code.op2(mnemonic, value, memory(entry.offset, Register::Gp));
        } else {
            let local = self.acquire(PoolKind::Local);
            self.code.op2("move", local, value);
            self.code.op2(mnemonic, local, memory(entry.offset, Register::Fp));
            self.release(local);
        }
    }
}

/// Walks a whole program and returns its listing.
pub fn generate_code(ast: &Ast, root: NodeId) -> Result<CodeTable, CompileError> {
    let mut generator = CodeGenerator::new(ast);
    generator.generate_program(root)?;
    Ok(generator.into_code())
}
