//! Test-only executor for the assembly subset the x86-64 generator emits.
//!
//! Runs a function on a simulated register file and stack and returns the
//! value left in `%rax` when it returns to the (synthetic) caller. Reads of
//! stack memory that was never written are reported as errors, which
//! catches offset bugs in the generator, and so is a `call` made with
//! `%rsp` off 16-byte alignment.

use std::collections::HashMap;

const STACK_TOP: i64 = 0x7fff_0000;
const RETURN_SENTINEL: i64 = -1;
const STEP_LIMIT: usize = 1_000_000;

#[derive(Debug, Clone)]
enum Operand {
    Imm(i64),
    Reg(String),
    Mem { base: String, disp: i64 },
}

#[derive(Debug, Clone)]
struct Instr {
    op: String,
    args: Vec<String>,
}

struct Machine {
    regs: HashMap<String, i64>,
    mem: HashMap<i64, i64>,
    /// Operands of the last `cmp src, dst`, as (dst, src)
    flags: (i64, i64),
}

/// Execute `entry` and return its result, or a description of what went wrong
pub fn run(asm: &str, entry: &str) -> Result<i64, String> {
    let (program, labels) = load(asm);
    let mut pc = *labels
        .get(entry)
        .ok_or_else(|| format!("no such function: {entry}"))?;

    let mut m = Machine {
        regs: HashMap::new(),
        mem: HashMap::new(),
        flags: (0, 0),
    };
    m.set("rsp", STACK_TOP);
    m.push(RETURN_SENTINEL);

    for _ in 0..STEP_LIMIT {
        let instr = program
            .get(pc)
            .ok_or_else(|| format!("fell off the end of the program at {pc}"))?;
        pc += 1;
        let arg = |i: usize| -> Result<Operand, String> {
            let text = instr
                .args
                .get(i)
                .ok_or_else(|| format!("{} is missing operand {i}", instr.op))?;
            parse_operand(text)
        };

        match instr.op.as_str() {
            "push" => {
                let v = m.read(&arg(0)?)?;
                m.push(v);
            }
            "pop" => {
                let v = m.pop()?;
                m.write(&arg(0)?, v)?;
            }
            "mov" => {
                let v = m.read(&arg(0)?)?;
                m.write(&arg(1)?, v)?;
            }
            "lea" => {
                let addr = m.address(&arg(0)?)?;
                m.write(&arg(1)?, addr)?;
            }
            "add" | "sub" | "imul" => {
                let src = m.read(&arg(0)?)?;
                let dst = arg(1)?;
                let cur = m.read(&dst)?;
                let v = match instr.op.as_str() {
                    "add" => cur.wrapping_add(src),
                    "sub" => cur.wrapping_sub(src),
                    _ => cur.wrapping_mul(src),
                };
                m.write(&dst, v)?;
            }
            "neg" => {
                let dst = arg(0)?;
                let v = m.read(&dst)?.wrapping_neg();
                m.write(&dst, v)?;
            }
            "cqo" => {
                let rdx = if m.get("rax") < 0 { -1 } else { 0 };
                m.set("rdx", rdx);
            }
            "idiv" => {
                let divisor = m.read(&arg(0)?)?;
                if divisor == 0 {
                    return Err("division by zero".to_string());
                }
                let dividend = m.get("rax");
                m.set("rax", dividend.wrapping_div(divisor));
                m.set("rdx", dividend.wrapping_rem(divisor));
            }
            "cmp" => {
                let src = m.read(&arg(0)?)?;
                let dst = m.read(&arg(1)?)?;
                m.flags = (dst, src);
            }
            "sete" | "setne" | "setl" | "setle" | "setg" | "setge" => {
                let (a, b) = m.flags;
                let bit = match instr.op.as_str() {
                    "sete" => a == b,
                    "setne" => a != b,
                    "setl" => a < b,
                    "setle" => a <= b,
                    "setg" => a > b,
                    _ => a >= b,
                };
                let rax = m.get("rax");
                m.set("rax", (rax & !0xff) | i64::from(bit));
            }
            "movzb" => {
                let v = m.read(&arg(0)?)?;
                m.write(&arg(1)?, v & 0xff)?;
            }
            "jmp" => {
                pc = target(&labels, &instr.args)?;
            }
            "call" => {
                let dest = target(&labels, &instr.args)?;
                if m.get("rsp").rem_euclid(16) != 0 {
                    return Err(format!("misaligned stack at call: rsp = {:#x}", m.get("rsp")));
                }
                m.push(pc as i64);
                pc = dest;
            }
            "ret" => {
                let addr = m.pop()?;
                if addr == RETURN_SENTINEL {
                    if m.get("rsp") != STACK_TOP {
                        return Err(format!("stack imbalance on return: rsp = {:#x}", m.get("rsp")));
                    }
                    return Ok(m.get("rax"));
                }
                pc = usize::try_from(addr).map_err(|_| format!("bad return address {addr}"))?;
            }
            other => return Err(format!("unsupported instruction: {other}")),
        }
    }

    Err("step limit exceeded".to_string())
}

/// Split assembly into instructions and a label table
fn load(asm: &str) -> (Vec<Instr>, HashMap<String, usize>) {
    let mut program = Vec::new();
    let mut labels = HashMap::new();

    for line in asm.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(label) = line.strip_suffix(':') {
            labels.insert(label.to_string(), program.len());
        } else if !line.starts_with('.') {
            let (op, rest) = line.split_once(' ').unwrap_or((line, ""));
            let args = rest
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect();
            program.push(Instr {
                op: op.to_string(),
                args,
            });
        }
    }

    (program, labels)
}

fn target(labels: &HashMap<String, usize>, args: &[String]) -> Result<usize, String> {
    let name = args.first().ok_or("jump without target")?;
    labels
        .get(name)
        .copied()
        .ok_or_else(|| format!("undefined label: {name}"))
}

fn parse_operand(text: &str) -> Result<Operand, String> {
    if let Some(imm) = text.strip_prefix('$') {
        return imm
            .parse()
            .map(Operand::Imm)
            .map_err(|_| format!("bad immediate {text}"));
    }
    if let Some(reg) = text.strip_prefix('%') {
        return Ok(Operand::Reg(reg.to_string()));
    }
    let (disp, base) = text
        .split_once('(')
        .ok_or_else(|| format!("bad operand {text}"))?;
    let base = base
        .strip_prefix('%')
        .and_then(|b| b.strip_suffix(')'))
        .ok_or_else(|| format!("bad memory operand {text}"))?;
    let disp = if disp.is_empty() {
        0
    } else {
        disp.parse().map_err(|_| format!("bad displacement {text}"))?
    };
    Ok(Operand::Mem {
        base: base.to_string(),
        disp,
    })
}

impl Machine {
    fn get(&self, reg: &str) -> i64 {
        self.regs.get(reg).copied().unwrap_or(0)
    }

    fn set(&mut self, reg: &str, value: i64) {
        self.regs.insert(reg.to_string(), value);
    }

    fn push(&mut self, value: i64) {
        let rsp = self.get("rsp") - 8;
        self.set("rsp", rsp);
        self.mem.insert(rsp, value);
    }

    fn pop(&mut self) -> Result<i64, String> {
        let rsp = self.get("rsp");
        let value = self.load(rsp)?;
        self.set("rsp", rsp + 8);
        Ok(value)
    }

    fn load(&self, addr: i64) -> Result<i64, String> {
        self.mem
            .get(&addr)
            .copied()
            .ok_or_else(|| format!("read of uninitialized memory at {addr:#x}"))
    }

    fn address(&self, op: &Operand) -> Result<i64, String> {
        match op {
            Operand::Mem { base, disp } => Ok(self.get(base) + disp),
            other => Err(format!("{other:?} has no address")),
        }
    }

    fn read(&self, op: &Operand) -> Result<i64, String> {
        match op {
            Operand::Imm(v) => Ok(*v),
            Operand::Reg(r) if r == "al" => Ok(self.get("rax") & 0xff),
            Operand::Reg(r) => Ok(self.get(r)),
            Operand::Mem { .. } => self.load(self.address(op)?),
        }
    }

    fn write(&mut self, op: &Operand, value: i64) -> Result<(), String> {
        match op {
            Operand::Imm(_) => Err("cannot write to an immediate".to_string()),
            Operand::Reg(r) => {
                self.set(r, value);
                Ok(())
            }
            Operand::Mem { .. } => {
                let addr = self.address(op)?;
                self.mem.insert(addr, value);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_hand_written_function() {
        let asm = "  .globl main\nmain:\n  mov $40, %rax\n  push %rax\n  mov $2, %rax\n  pop %rdi\n  add %rdi, %rax\n  ret\n";
        assert_eq!(run(asm, "main"), Ok(42));
    }

    #[test]
    fn test_detects_stack_imbalance() {
        // returns to the caller with an extra word still on the stack
        let asm = "main:\n  pop %rdi\n  push %rdi\n  push %rdi\n  ret\n";
        assert!(run(asm, "main").unwrap_err().contains("imbalance"));
    }

    #[test]
    fn test_detects_misaligned_call() {
        let asm = "main:\n  push %rbp\n  push %rbp\n  call f\n  ret\nf:\n  ret\n";
        assert!(run(asm, "main").unwrap_err().contains("misaligned"));
    }

    #[test]
    fn test_detects_uninitialized_read() {
        let asm = "main:\n  mov -8(%rsp), %rax\n  ret\n";
        assert!(run(asm, "main").unwrap_err().contains("uninitialized"));
    }
}
