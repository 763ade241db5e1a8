//! Body verification at commit time.
//!
//! A single forward pass over each body computes the evaluation stack depth
//! before every instruction, following both edges of conditional branches.
//! A body is accepted when:
//!
//! - no instruction pops more than the stack holds;
//! - every join point is reached with the same depth;
//! - every `ret` leaves exactly the return value (or nothing for `void`);
//! - control never runs past the last instruction;
//! - argument, local, and callee references resolve.
//!
//! Constructors must additionally contain a chain call to a constructor of
//! the base type or of the type itself.

use forge_ir::{Instr, InstrBuffer, Label};
use forge_meta::{ConstructorRef, MethodRef, TypeId};

use crate::VerifyError;

/// Stack-relevant shape of a callee.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Signature {
    pub(crate) arity: usize,
    pub(crate) has_this: bool,
    pub(crate) returns_value: bool,
}

/// Resolves callee signatures, including members of the type being committed.
pub(crate) trait SignatureSource {
    fn method(&self, method: MethodRef) -> Option<Signature>;

    /// Parameter count of a constructor.
    fn constructor(&self, ctor: ConstructorRef) -> Option<usize>;
}

/// The body under verification and its own signature.
pub(crate) struct BodyShape<'a> {
    pub(crate) code: &'a InstrBuffer,
    pub(crate) signature: Signature,
}

pub(crate) fn verify_body(
    body: &BodyShape<'_>,
    sigs: &dyn SignatureSource,
) -> Result<(), VerifyError> {
    let instrs = body.code.instrs();
    if instrs.is_empty() {
        return Err(VerifyError::FallsThrough);
    }

    let mut depths: Vec<Option<usize>> = vec![None; instrs.len()];
    let mut worklist = vec![0usize];
    depths[0] = Some(0);

    while let Some(pc) = worklist.pop() {
        let depth = depths[pc].unwrap_or_default();
        let instr = &instrs[pc];
        let (pops, pushes) = effect(body, sigs, instr, pc)?;
        if depth < pops {
            return Err(VerifyError::StackUnderflow { at: pc });
        }
        let after = depth - pops + pushes;

        let mut flow = |to: usize| -> Result<(), VerifyError> {
            if to >= instrs.len() {
                return Err(VerifyError::FallsThrough);
            }
            match depths[to] {
                None => {
                    depths[to] = Some(after);
                    worklist.push(to);
                    Ok(())
                }
                Some(expected) if expected != after => Err(VerifyError::InconsistentDepth {
                    at: to,
                    expected,
                    found: after,
                }),
                Some(_) => Ok(()),
            }
        };

        match instr {
            Instr::Ret => {
                let expected = usize::from(body.signature.returns_value);
                if depth != expected {
                    return Err(VerifyError::BadReturn {
                        at: pc,
                        expected,
                        found: depth,
                    });
                }
            }
            Instr::Br(label) => flow(target(body.code, *label)?)?,
            Instr::BrFalse(label) => {
                flow(target(body.code, *label)?)?;
                flow(pc + 1)?;
            }
            _ => flow(pc + 1)?,
        }
    }

    tracing::trace!(instrs = instrs.len(), "verified body");
    Ok(())
}

/// Require a chain call to one of `targets` somewhere in a constructor body.
pub(crate) fn verify_chain(code: &InstrBuffer, targets: &[TypeId]) -> Result<(), VerifyError> {
    let chains = code
        .instrs()
        .iter()
        .any(|instr| matches!(instr, Instr::CallCtor(c) if targets.contains(&c.declaring_type)));
    if chains {
        Ok(())
    } else {
        Err(VerifyError::MissingChain)
    }
}

fn target(code: &InstrBuffer, label: Label) -> Result<usize, VerifyError> {
    code.label_target(label)
        .ok_or(VerifyError::UnmarkedLabel(label))
}

/// `(pops, pushes)` of one instruction.
fn effect(
    body: &BodyShape<'_>,
    sigs: &dyn SignatureSource,
    instr: &Instr,
    at: usize,
) -> Result<(usize, usize), VerifyError> {
    let unknown = |member: String| VerifyError::UnknownMember { at, member };
    Ok(match instr {
        Instr::LoadArg(position) => {
            let sig = body.signature;
            let valid = if *position == 0 {
                sig.has_this
            } else {
                usize::from(*position) <= sig.arity
            };
            if !valid {
                return Err(VerifyError::BadArgument {
                    at,
                    position: *position,
                });
            }
            (0, 1)
        }
        Instr::LoadLocal(local) | Instr::StoreLocal(local) => {
            if local.index() >= body.code.locals().len() {
                return Err(VerifyError::BadLocal {
                    at,
                    local: local.raw(),
                });
            }
            if matches!(instr, Instr::LoadLocal(_)) {
                (0, 1)
            } else {
                (1, 0)
            }
        }
        Instr::Call(method) | Instr::CallVirtual(method) => {
            let sig = sigs
                .method(*method)
                .ok_or_else(|| unknown(method.to_string()))?;
            (
                sig.arity + usize::from(sig.has_this),
                usize::from(sig.returns_value),
            )
        }
        Instr::CallCtor(ctor) => {
            let arity = sigs
                .constructor(*ctor)
                .ok_or_else(|| unknown(ctor.to_string()))?;
            (arity + 1, 0)
        }
        Instr::NewObj(ctor) => {
            let arity = sigs
                .constructor(*ctor)
                .ok_or_else(|| unknown(ctor.to_string()))?;
            (arity, 1)
        }
        Instr::LoadConst(_) | Instr::LoadStaticField(_) => (0, 1),
        Instr::LoadField(_) => (1, 1),
        Instr::StoreField(_) => (2, 0),
        Instr::StoreStaticField(_) | Instr::Pop | Instr::BrFalse(_) => (1, 0),
        Instr::Binary(_) => (2, 1),
        Instr::Br(_) | Instr::Ret => (0, 0),
    })
}
