use crate::model::{Batch, StringMap};

/// Greedy insertion-order packing of `pending` into batches of at most `budget` characters.
///
/// A value longer than the budget is never split: it gets a batch of its own.
pub fn pack(pending: &StringMap, budget: usize) -> Vec<Batch> {
    let mut batches: Vec<Batch> = Vec::new();
    let mut current = StringMap::new();
    let mut current_size = 0usize;

    for (key, value) in pending.iter() {
        let len = value.chars().count();

        if len > budget {
            flush(std::mem::take(&mut current), &mut batches);
            current_size = 0;

            let mut single = StringMap::new();
            single.insert(key, value);
            flush(single, &mut batches);
        } else if current_size + len > budget {
            flush(std::mem::take(&mut current), &mut batches);
            current.insert(key, value);
            current_size = len;
        } else {
            current.insert(key, value);
            current_size += len;
        }
    }

    flush(current, &mut batches);
    batches
}

fn flush(entries: StringMap, batches: &mut Vec<Batch>) {
    if !entries.is_empty() {
        let id = batches.len();
        batches.push(Batch { id, entries });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(batch: &Batch) -> Vec<&str> {
        batch.keys().collect()
    }

    #[test]
    fn packs_until_budget() {
        let pending: StringMap = [("a", "aaaa"), ("b", "bbbb"), ("c", "cc"), ("d", "dddd")]
            .into_iter()
            .collect();

        let batches = pack(&pending, 10);
        assert_eq!(batches.len(), 2);
        assert_eq!(keys(&batches[0]), vec!["a", "b", "c"]);
        assert_eq!(keys(&batches[1]), vec!["d"]);
        assert_eq!(batches[1].id, 1);
    }

    #[test]
    fn oversized_value_is_a_singleton() {
        let big = "x".repeat(25);
        let pending: StringMap = [("a", "aa"), ("big", big.as_str()), ("b", "bb")]
            .into_iter()
            .collect();

        let batches = pack(&pending, 10);
        assert_eq!(batches.len(), 3);
        assert_eq!(keys(&batches[0]), vec!["a"]);
        assert_eq!(keys(&batches[1]), vec!["big"]);
        assert_eq!(keys(&batches[2]), vec!["b"]);
    }

    #[test]
    fn every_batch_respects_budget_unless_singleton() {
        let pending: StringMap = (0..200)
            .map(|i| (format!("k{i}"), "w".repeat((i * 7) % 23 + 1)))
            .collect();

        for budget in [1usize, 5, 16, 40, 100] {
            let batches = pack(&pending, budget);

            let total: usize = batches.iter().map(Batch::len).sum();
            assert_eq!(total, pending.len());

            for b in &batches {
                assert!(b.char_len() <= budget || b.len() == 1, "budget {budget} violated");
            }

            let flattened: Vec<&str> = batches.iter().flat_map(|b| b.keys()).collect();
            let expected: Vec<&str> = pending.keys().collect();
            assert_eq!(flattened, expected);
        }
    }

    #[test]
    fn empty_input_produces_no_batches() {
        assert!(pack(&StringMap::new(), 100).is_empty());
    }
}
