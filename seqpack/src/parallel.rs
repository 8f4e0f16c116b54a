use crate::reader::Reader;
use crate::seq::Sequence;
use crossbeam_channel::{bounded, Receiver};
use scoped_threadpool::Pool;
use std::io::Result;
use std::sync::atomic::{AtomicBool, Ordering};

/// Fan a record stream over a fixed worker set.
///
/// One parser thread pulls batches from `reader`, `workers` threads
/// apply `work`, and a collector thread folds the outputs with
/// `collect`; the scaffold owns those two extra threads, so callers
/// size only the hashing workers. Queues hold two batches per worker:
/// enough to hide parser latency, small enough that a stalled consumer
/// stops the parser instead of buffering the file.
///
/// `cancel` is checked at the top of every loop; once set, in-flight
/// batches drain and the scope joins.
pub fn read_parallel<R, W, O, F, Out>(
    reader: &mut R,
    workers: usize,
    cancel: &AtomicBool,
    work: W,
    collect: F,
) -> Result<Out>
where
    R: Reader,
    O: Send,
    Out: Send,
    W: Send + Sync + Fn(Vec<Sequence>) -> Option<O>,
    F: FnOnce(Receiver<Option<O>>) -> Out + Send,
{
    let workers = workers.max(1);
    let depth = workers * 2;
    let (batch_tx, batch_rx) = bounded::<Vec<Sequence>>(depth);
    let (out_tx, out_rx) = bounded::<Option<O>>(depth);
    let mut pool = Pool::new((workers + 2) as u32);

    let mut collected: Option<Out> = None;
    let collected_ref = &mut collected;

    pool.scoped(|scope| {
        scope.execute(move || {
            while !cancel.load(Ordering::Relaxed) {
                match reader.next() {
                    Ok(Some(batch)) => {
                        if batch_tx.send(batch).is_err() {
                            break;
                        }
                    }
                    _ => break,
                }
            }
        });

        for _ in 0..workers {
            let batches = batch_rx.clone();
            let outputs = out_tx.clone();
            let work = &work;
            scope.execute(move || {
                while !cancel.load(Ordering::Relaxed) {
                    match batches.recv() {
                        Ok(batch) => {
                            if outputs.send(work(batch)).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
            });
        }
        // release the originals so the channels close once the parser
        // and workers are done
        drop(batch_rx);
        drop(out_tx);

        scope.execute(move || {
            *collected_ref = Some(collect(out_rx));
        });

        scope.join_all();
    });

    Ok(collected.expect("collector thread did not run"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fasta::FastaRecords;
    use crate::reader::Batcher;

    #[test]
    fn all_records_reach_the_collector() {
        let mut data = Vec::new();
        for i in 0..100 {
            data.extend_from_slice(format!(">r{}\nACGTACGT\n", i).as_bytes());
        }
        // 8-base records against a 50-base budget: several batches
        let mut reader = Batcher::with_budget(FastaRecords::new(&data[..], 0), 50);
        let cancel = AtomicBool::new(false);
        let total = read_parallel(
            &mut reader,
            2,
            &cancel,
            |batch| Some(batch.len()),
            |outputs| outputs.iter().flatten().sum::<usize>(),
        )
        .unwrap();
        assert_eq!(total, 100);
    }

    #[test]
    fn cancellation_stops_the_parser() {
        let mut data = Vec::new();
        for i in 0..1000 {
            data.extend_from_slice(format!(">r{}\nACGTACGT\n", i).as_bytes());
        }
        let mut reader = Batcher::with_budget(FastaRecords::new(&data[..], 0), 8);
        let cancel = AtomicBool::new(true); // cancelled before work starts
        let total = read_parallel(
            &mut reader,
            2,
            &cancel,
            |batch| Some(batch.len()),
            |outputs| outputs.iter().flatten().sum::<usize>(),
        )
        .unwrap();
        assert_eq!(total, 0);
    }
}
