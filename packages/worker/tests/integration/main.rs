mod harness;
mod pipeline;
mod upload;
