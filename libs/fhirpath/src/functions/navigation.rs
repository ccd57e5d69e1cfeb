//! Tree navigation: `children` and `descendants`.

use crate::value::{Collection, Value};

pub fn children(target: &Collection) -> Collection {
    let mut out = Collection::empty();
    for v in target.iter() {
        for child in v.children(&[]) {
            out.push(child);
        }
    }
    out
}

/// All descendants in breadth-first order, excluding the input itself.
pub fn descendants(target: &Collection) -> Collection {
    let mut out = Collection::empty();
    let mut frontier: Vec<Value> = target.iter().cloned().collect();
    while !frontier.is_empty() {
        let mut next = Vec::new();
        for v in &frontier {
            for child in v.children(&[]) {
                next.push(child.clone());
                out.push(child);
            }
        }
        frontier = next;
    }
    out
}
