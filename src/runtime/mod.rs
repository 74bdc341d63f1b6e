use std::rc::Rc;

use crate::bus::Bus;
use crate::config::Config;
use crate::engine::Engine;
use crate::store::PlanStore;
use crate::time::MonotonicClock;
use crate::transport;

#[derive(Debug)]
pub enum Error {
    /// An I/O error occured.
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

pub type Result<T = ()> = std::result::Result<T, Error>;

/// Launch the daemon runtime.
///
/// The engine runs one cooperative loop on a single-threaded reactor; the
/// bus gateway is the only other task. This method blocks until termination
/// is requested or the bus closes.
pub fn run(config: Config) -> Result {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(Error::Io)?;

    runtime.block_on(async move {
        let mut store = PlanStore::new(&config.store.directory);
        if let Err(e) = store.open() {
            // The engine comes up refusing requests until the store works.
            log::error!("Failed to open plan store: {}", e);
        }

        let bus = Bus::new();
        let (inbox, handle) = bus.split();

        if let Some(transport_config) = config.transport.clone() {
            let gateway_handle = handle.clone();

            tokio::spawn(async move {
                if let Err(e) = transport::serve(transport_config, gateway_handle).await {
                    log::error!("Bus gateway failed: {}", e);
                }
            });
        }

        let engine = Engine::new(&config, store, handle, Rc::new(MonotonicClock::new()));

        tokio::select! {
            _ = engine.run(inbox) => {}
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    log::info!("Termination requested");
                }
            }
        }

        Ok(())
    })
}
