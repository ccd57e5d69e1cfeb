//! Combining functions: `union` (set semantics) and `combine` (bag
//! semantics). `coalesce` short-circuits, so it lives in the engine.

use crate::value::Collection;

pub fn union(target: &Collection, other: &Collection) -> Collection {
    let mut out = target.distinct();
    for v in other.iter() {
        if !out.contains_value(v) {
            out.push(v.clone());
        }
    }
    out
}

pub fn combine(mut target: Collection, other: Collection) -> Collection {
    target.extend(other);
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn ints(values: &[i32]) -> Collection {
        values.iter().map(|i| Value::Integer(*i)).collect()
    }

    #[test]
    fn union_deduplicates_combine_does_not() {
        let a = ints(&[1, 2, 2]);
        let b = ints(&[2, 3]);
        assert_eq!(union(&a, &b), ints(&[1, 2, 3]));
        assert_eq!(combine(a, b), ints(&[1, 2, 2, 2, 3]));
    }
}
