//! Streaming building blocks shared by operators.

use std::sync::Arc;

use bopline_bop::chunk::{apply_constraints, empty_chunk};
use bopline_bop::{BindingSet, Chunk, Constraint};
use bopline_core::var::Var;

use crate::buffer::{AsyncSource, BlockingBuffer};
use crate::error::{ExecError, Result};
use crate::stats::BopStats;

/// Move every chunk of `source` through constraints and projection into
/// `sink` (and `sink2` when given).
///
/// Returns the number of input solutions read, accepted or not.
pub async fn copy(
    source: &mut AsyncSource,
    sink: &BlockingBuffer,
    sink2: Option<&BlockingBuffer>,
    select: Option<&[Var]>,
    constraints: Option<&[Constraint]>,
    stats: &BopStats,
) -> Result<u64> {
    let mut units_in = 0u64;
    while let Some(chunk) = source.next().await {
        stats.add_chunk_in(chunk.len());
        units_in += chunk.len() as u64;
        let out = apply_constraints(&chunk, select, constraints);
        tracing::trace!(units_in = chunk.len(), units_out = out.len(), "copied chunk");
        if let Some(sink2) = sink2 {
            sink.add(Arc::clone(&out)).await?;
            sink2.add(out).await?;
        } else {
            sink.add(out).await?;
        }
    }
    Ok(units_in)
}

/// Drain `source` into one dense chunk.
///
/// Zero chunks give an empty chunk and a single chunk is returned as is;
/// otherwise the chunks are concatenated in arrival order.
pub async fn to_array(source: &mut AsyncSource, stats: &BopStats) -> Result<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut total = 0usize;
    while let Some(chunk) = source.next().await {
        stats.add_chunk_in(chunk.len());
        tracing::trace!(units = chunk.len(), "buffered chunk");
        total += chunk.len();
        chunks.push(chunk);
    }
    match chunks.len() {
        0 => Ok(empty_chunk()),
        1 => Ok(chunks.pop().unwrap_or_else(empty_chunk)),
        _ => concat(&chunks, total),
    }
}

/// Concatenate `chunks` into a `target_len`-element chunk, failing if a
/// chunk would overrun it.
pub fn concat(chunks: &[Chunk], target_len: usize) -> Result<Chunk> {
    let mut out: Vec<BindingSet> = Vec::with_capacity(target_len);
    for chunk in chunks {
        let offset = out.len();
        if offset + chunk.len() > target_len {
            return Err(ExecError::Bounds {
                chunk_len: chunk.len(),
                target_len,
                offset,
            });
        }
        out.extend(chunk.iter().cloned());
    }
    Ok(Arc::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bopline_bop::chunk::chunk_of;

    fn chunk(lo: i64, hi: i64) -> Chunk {
        let x = Var::named("chunks_x");
        chunk_of((lo..hi).map(|i| BindingSet::new().with(x, i)).collect())
    }

    #[tokio::test]
    async fn test_to_array_zero_one_many() {
        let stats = BopStats::new();
        let empty = to_array(&mut AsyncSource::empty(), &stats).await.unwrap();
        assert!(empty.is_empty());

        let only = chunk(0, 3);
        let got = to_array(&mut AsyncSource::from_chunks([Arc::clone(&only)]), &stats)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&got, &only));

        let mut source = AsyncSource::from_chunks([chunk(0, 2), chunk(2, 3), chunk(3, 6)]);
        let all = to_array(&mut source, &stats).await.unwrap();
        let x = Var::named("chunks_x");
        let xs: Vec<_> = all.iter().map(|bs| bs.get(x).cloned()).collect();
        assert_eq!(xs.len(), 6);
        assert_eq!(xs[5], Some(bopline_core::value::Value::Int(5)));

        let snap = stats.snapshot();
        assert_eq!((snap.chunks_in, snap.units_in), (4, 9));
    }

    #[test]
    fn test_concat_reports_overrun() {
        let err = concat(&[chunk(0, 2), chunk(0, 3)], 4).unwrap_err();
        match err {
            ExecError::Bounds {
                chunk_len,
                target_len,
                offset,
            } => assert_eq!((chunk_len, target_len, offset), (3, 4, 2)),
            other => panic!("unexpected {other}"),
        }
    }
}
