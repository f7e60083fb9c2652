use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(
        "Giving up after {attempts} attempts across {}; ensure the device is online and reachable",
        .hosts.join(", ")
    )]
    Exhausted { hosts: Vec<String>, attempts: u32 },
    #[error("Failed to write stream output: {0}")]
    Sink(#[from] std::io::Error),
}
