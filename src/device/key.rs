use super::{FileOperations, Session};
use crate::{
    admission::AdmissionGate,
    config::{DriverConfig, KeyDesc, INVALID_KEY, MAX_KEY_CODE},
    debounce::{Debouncer, KeyEvent},
    error::{Error, Result},
    key_codes::KeyValue,
    line::{Line, LineId, LinePin, LineRegistry},
};

/// Interrupt-driven keys. Reads return the newest debounced key value.
pub struct KeyDevice<P> {
    gate: AdmissionGate,
    debouncer: Debouncer<P>,
}

impl<P> KeyDevice<P>
where
    P: LinePin + Send + 'static,
{
    /// Claim and configure every key line in table order. If any line fails, the lines
    /// already set up are given back in reverse order and the load is aborted. A key
    /// code above `MAX_KEY_CODE` aborts the load the same way.
    pub fn load<I>(registry: &'static LineRegistry, keys: I, config: &DriverConfig) -> Result<Self>
    where
        I: IntoIterator<Item = (KeyDesc, P)>,
    {
        let mut lines: Vec<(KeyDesc, Line<P>)> = Vec::new();
        for (desc, pin) in keys {
            let claimed = if desc.has_valid_code() {
                Line::claim(registry, desc.gpio, pin, config.polarity)
                    .and_then(|mut line| line.configure_as_input().map(|()| line))
            } else {
                error!("{}: key code {:#x} above {:#x}", desc.name, desc.code, MAX_KEY_CODE);
                Err(Error::InvalidPayload)
            };
            match claimed {
                Ok(line) => lines.push((desc, line)),
                Err(err) => {
                    error!("{}: cannot set up line {}: {}", desc.name, desc.gpio.0, err);
                    while let Some((_, line)) = lines.pop() {
                        drop(line);
                    }
                    return Err(err);
                }
            }
        }

        let debouncer = Debouncer::new(lines, config)?;
        info!("keys: loaded {} lines", debouncer.keys().count());
        Ok(Self { gate: AdmissionGate::new(), debouncer })
    }

    /// Edge interrupt on `line`. Cheap and non-blocking; the key is classified later
    /// from timer context.
    pub fn handle_interrupt(&self, line: LineId) {
        self.debouncer.on_edge(line);
    }

    pub fn value(&self, line: LineId) -> Option<KeyValue> {
        self.debouncer.value(line)
    }

    pub fn latest(&self) -> Option<KeyEvent> {
        self.debouncer.latest()
    }

    pub fn debouncer(&self) -> &Debouncer<P> {
        &self.debouncer
    }
}

impl<P> FileOperations for KeyDevice<P>
where
    P: LinePin + Send + 'static,
{
    fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// One byte: the newest key value, or `INVALID_KEY` before the first key event.
    fn read(&self, _session: &Session<'_>, buf: &mut [u8]) -> Result<usize> {
        let Some(first) = buf.first_mut() else {
            return Ok(0);
        };
        *first = self.latest().map_or(INVALID_KEY, |event| u8::from(event.value));
        Ok(1)
    }
}
