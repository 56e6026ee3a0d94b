#![forbid(unsafe_code)]

use quill_ir::{Context, Cv, IrError, Kind, SVal};

use crate::predicates::{Overflow, bit_vec};

/// Some bit in `lo..hi` is set; `false` for an empty range.
fn any_set(ctx: &mut Context, a: &SVal, lo: u32, hi: u32) -> Result<SVal, IrError> {
    if lo >= hi {
        return Ok(ctx.bool(false));
    }
    let bits = ctx.extract(a, hi - 1, lo)?;
    let zero = ctx.bv(bits.kind(), 0);
    ctx.neq(&bits, &zero)
}

/// Every bit in `lo..hi` is set; `true` for an empty range.
fn all_set(ctx: &mut Context, a: &SVal, lo: u32, hi: u32) -> Result<SVal, IrError> {
    if lo >= hi {
        return Ok(ctx.bool(true));
    }
    let bits = ctx.extract(a, hi - 1, lo)?;
    let ones = SVal::Concrete(Cv::bv_max(bits.kind()));
    ctx.eq(&bits, &ones)
}

/// Whether converting `a` to the bit-vector kind `target` leaves the
/// target's range: below its minimum (underflow) or above its maximum
/// (overflow). Decided on the bits of `a` alone.
pub fn from_integral_overflow(ctx: &mut Context, a: &SVal, target: &Kind) -> Result<Overflow, IrError> {
    let (from_signed, n) = bit_vec("fromIntegral", a.kind())?;
    let (to_signed, m) = bit_vec("fromIntegral", target)?;
    if n == 0 {
        return Ok(Overflow::none());
    }
    let sign = if from_signed { ctx.sign_bit(a)? } else { ctx.bool(false) };
    let positive = ctx.not(&sign)?;

    if !to_signed || m == 0 {
        // Target range is [0, 2^m).
        let overflow = if from_signed {
            let high = any_set(ctx, a, m, n - 1)?;
            ctx.and(&positive, &high)?
        } else {
            any_set(ctx, a, m, n)?
        };
        return Ok(Overflow {
            underflow: sign,
            overflow,
        });
    }

    // Target range is [-2^(m-1), 2^(m-1)).
    if !from_signed {
        return Ok(Overflow::over(any_set(ctx, a, m - 1, n)?));
    }
    let high = any_set(ctx, a, m - 1, n - 1)?;
    let all_high = all_set(ctx, a, m - 1, n - 1)?;
    let not_all_high = ctx.not(&all_high)?;
    Ok(Overflow {
        underflow: ctx.and(&sign, &not_all_high)?,
        overflow: ctx.and(&positive, &high)?,
    })
}
