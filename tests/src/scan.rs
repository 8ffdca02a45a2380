mod concurrency;
mod emitter;
mod enrichment;
mod integration;
