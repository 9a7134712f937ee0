//! Thread-safe parser pool for tree-sitter parsers
//!
//! Tree-sitter parsers are not `Sync`, so each worker thread owns one Java
//! parser and requests reach the workers over a channel.

use anyhow::{Result, anyhow};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use tree_sitter::{Parser, Tree};

/// A parsing request sent to the parser pool
#[derive(Debug)]
pub struct ParseRequest {
    pub content: String,
    pub path: PathBuf,
}

/// Result of a parsing operation
#[derive(Debug)]
pub struct ParseResult {
    pub tree: Tree,
    pub path: PathBuf,
    pub content: String,
}

struct WorkerRequest {
    request: ParseRequest,
    response_sender: Sender<Result<ParseResult>>,
}

/// Pool of dedicated Java parser threads
#[derive(Clone)]
pub struct ParserPool {
    sender: Sender<WorkerRequest>,
}

impl ParserPool {
    /// Create a new parser pool with the specified number of worker threads
    pub fn new(num_workers: usize) -> Self {
        let (sender, receiver) = channel::<WorkerRequest>();
        let receiver = Arc::new(Mutex::new(receiver));

        for i in 0..num_workers.max(1) {
            let receiver = receiver.clone();
            std::thread::Builder::new()
                .name(format!("callweave-parser-{i}"))
                .spawn(move || Self::worker_thread(i, receiver))
                .ok();
        }

        Self { sender }
    }

    fn worker_thread(worker_id: usize, receiver: Arc<Mutex<Receiver<WorkerRequest>>>) {
        tracing::debug!("Parser worker {} started", worker_id);

        let mut parser = Parser::new();
        if let Err(e) = parser.set_language(&tree_sitter_java::LANGUAGE.into()) {
            tracing::error!("Parser worker {} cannot load the Java grammar: {}", worker_id, e);
            return;
        }

        loop {
            // Only hold the lock while waiting for the next request.
            let next = receiver.lock().recv();
            let WorkerRequest {
                request,
                response_sender,
            } = match next {
                Ok(req) => req,
                Err(_) => {
                    tracing::debug!("Parser worker {} shutting down", worker_id);
                    break;
                }
            };

            let result = match parser.parse(&request.content, None) {
                Some(tree) => Ok(ParseResult {
                    tree,
                    path: request.path,
                    content: request.content,
                }),
                None => Err(anyhow!("Failed to parse {}", request.path.display())),
            };

            if response_sender.send(result).is_err() {
                tracing::warn!("Failed to send parse result back to caller");
            }
        }
    }

    /// Hand a request to the workers. The returned receiver yields its result.
    fn submit(&self, request: ParseRequest) -> Result<Receiver<Result<ParseResult>>> {
        let (reply, pending) = channel();
        self.sender
            .send(WorkerRequest {
                request,
                response_sender: reply,
            })
            .map_err(|_| anyhow!("Parser pool is shut down"))?;
        Ok(pending)
    }

    fn wait(pending: Receiver<Result<ParseResult>>) -> Result<ParseResult> {
        pending.recv().map_err(|_| anyhow!("Parser worker died"))?
    }

    /// Parse content, blocking the current thread until a worker is done.
    pub fn parse_blocking(&self, request: ParseRequest) -> Result<ParseResult> {
        Self::wait(self.submit(request)?)
    }

    /// Queue every request before waiting, so the workers parse in parallel.
    /// Results come back in request order.
    pub fn parse_all(&self, requests: Vec<ParseRequest>) -> Vec<Result<ParseResult>> {
        let pending: Vec<_> = requests.into_iter().map(|request| self.submit(request)).collect();
        pending
            .into_iter()
            .map(|submitted| submitted.and_then(Self::wait))
            .collect()
    }
}

/// Convenience function to create a parser pool with default settings
pub fn create_parser_pool() -> ParserPool {
    // One parser per core, but at least 2
    let num_workers = std::thread::available_parallelism()
        .map(|n| n.get().max(2))
        .unwrap_or(2);

    ParserPool::new(num_workers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_java() {
        let pool = create_parser_pool();
        let content = r#"
class Greeter {
    void greet() {
        System.out.println("Hello");
    }
}
"#
        .to_string();

        let result = pool
            .parse_blocking(ParseRequest {
                content,
                path: PathBuf::from("Greeter.java"),
            })
            .unwrap();
        assert_eq!(result.tree.root_node().kind(), "program");
    }

    #[test]
    fn test_pool_serves_concurrent_callers() {
        let pool = ParserPool::new(2);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    pool.parse_blocking(ParseRequest {
                        content: format!("class C{i} {{ void m{i}() {{}} }}"),
                        path: PathBuf::from(format!("C{i}.java")),
                    })
                })
            })
            .collect();

        for handle in handles {
            let result = handle.join().unwrap().unwrap();
            assert!(!result.tree.root_node().has_error());
        }
    }
}
