//! Subsetting functions: `first`, `last`, `tail`, `skip`, `take`,
//! `intersect`, `exclude`, `single`.

use super::singleton_integer;
use crate::error::Result;
use crate::value::Collection;

pub fn first(target: &Collection) -> Collection {
    target.first().cloned().map(Collection::single).unwrap_or_default()
}

pub fn last(target: &Collection) -> Collection {
    target
        .iter()
        .last()
        .cloned()
        .map(Collection::single)
        .unwrap_or_default()
}

pub fn tail(target: &Collection) -> Collection {
    target.iter().skip(1).cloned().collect()
}

pub fn skip(target: &Collection, n: &Collection) -> Result<Collection> {
    let Some(n) = singleton_integer(n, "skip")? else {
        return Ok(Collection::empty());
    };
    let n = n.max(0) as usize;
    Ok(target.iter().skip(n).cloned().collect())
}

pub fn take(target: &Collection, n: &Collection) -> Result<Collection> {
    let Some(n) = singleton_integer(n, "take")? else {
        return Ok(Collection::empty());
    };
    let n = n.max(0) as usize;
    Ok(target.iter().take(n).cloned().collect())
}

pub fn intersect(target: &Collection, other: &Collection) -> Collection {
    let mut out = Collection::empty();
    for v in target.iter() {
        if other.contains_value(v) && !out.contains_value(v) {
            out.push(v.clone());
        }
    }
    out
}

pub fn exclude(target: &Collection, other: &Collection) -> Collection {
    target
        .iter()
        .filter(|v| !other.contains_value(v))
        .cloned()
        .collect()
}

pub fn single(target: &Collection) -> Result<Collection> {
    Ok(target
        .singleton()?
        .cloned()
        .map(Collection::single)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn ints(values: &[i32]) -> Collection {
        values.iter().map(|i| Value::Integer(*i)).collect()
    }

    #[test]
    fn ends_and_slices() {
        let c = ints(&[1, 2, 3, 4]);
        assert_eq!(first(&c), ints(&[1]));
        assert_eq!(last(&c), ints(&[4]));
        assert_eq!(tail(&c), ints(&[2, 3, 4]));
        assert_eq!(skip(&c, &ints(&[2])).unwrap(), ints(&[3, 4]));
        assert_eq!(take(&c, &ints(&[2])).unwrap(), ints(&[1, 2]));
        // Negative counts clamp.
        assert_eq!(skip(&c, &ints(&[-1])).unwrap(), c);
        assert_eq!(take(&c, &ints(&[-1])).unwrap(), ints(&[]));
    }

    #[test]
    fn set_operations() {
        let a = ints(&[1, 2, 2, 3]);
        let b = ints(&[2, 3, 5]);
        assert_eq!(intersect(&a, &b), ints(&[2, 3]));
        assert_eq!(exclude(&a, &b), ints(&[1]));
    }

    #[test]
    fn single_enforces_cardinality() {
        assert!(single(&ints(&[1, 2])).is_err());
        assert_eq!(single(&ints(&[7])).unwrap(), ints(&[7]));
        assert_eq!(single(&ints(&[])).unwrap(), Collection::empty());
    }
}
