//! Host backend
//!
//! Executes the transition contract on the calling thread, one worker after
//! another. Every handle it hands out records its acquisition and its release
//! in a shared [`ResourceLedger`], which makes teardown observable.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{read_scalar, BufferUsage, ComputeBackend, KernelArgs};
use crate::error::{LifeError, Result};
use crate::kernel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Kernel,
    Program,
    Queue,
    Context,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEvent {
    Acquired(ResourceKind, u64),
    Released(ResourceKind, u64),
}

/// Append-only record of every handle acquired and released
#[derive(Debug, Default)]
pub struct ResourceLedger {
    events: RefCell<Vec<LedgerEvent>>,
    next_id: Cell<u64>,
}

fn acquire(ledger: &Rc<ResourceLedger>, kind: ResourceKind) -> HostHandle {
    let id = ledger.next_id.get();
    ledger.next_id.set(id + 1);
    ledger
        .events
        .borrow_mut()
        .push(LedgerEvent::Acquired(kind, id));
    HostHandle {
        kind,
        id,
        ledger: Rc::clone(ledger),
    }
}

impl ResourceLedger {
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.borrow().clone()
    }

    pub fn acquired(&self, kind: ResourceKind) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, LedgerEvent::Acquired(k, _) if *k == kind))
            .count()
    }

    pub fn released(&self, kind: ResourceKind) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, LedgerEvent::Released(k, _) if *k == kind))
            .count()
    }

    /// Handles acquired but not yet released
    pub fn outstanding(&self) -> usize {
        self.events.borrow().iter().fold(0usize, |n, e| match e {
            LedgerEvent::Acquired(..) => n + 1,
            LedgerEvent::Released(..) => n.saturating_sub(1),
        })
    }

    /// Kinds in the order their releases happened, consecutive repeats merged
    pub fn release_order(&self) -> Vec<ResourceKind> {
        let mut order: Vec<ResourceKind> = Vec::new();
        for event in self.events.borrow().iter() {
            if let LedgerEvent::Released(kind, _) = event {
                if order.last() != Some(kind) {
                    order.push(*kind);
                }
            }
        }
        order
    }
}

/// Releases itself into the ledger when dropped
#[derive(Debug)]
struct HostHandle {
    kind: ResourceKind,
    id: u64,
    ledger: Rc<ResourceLedger>,
}

impl Drop for HostHandle {
    fn drop(&mut self) {
        self.ledger
            .events
            .borrow_mut()
            .push(LedgerEvent::Released(self.kind, self.id));
    }
}

type Storage = Rc<RefCell<Vec<u8>>>;

#[derive(Debug)]
pub struct HostBuffer {
    storage: Storage,
    usage: BufferUsage,
    _handle: HostHandle,
}

#[derive(Debug)]
pub struct HostProgram {
    entry_point: String,
    _handle: HostHandle,
}

#[derive(Debug)]
pub struct HostKernel {
    label: String,
    source: Storage,
    destination: Storage,
    pixels: Storage,
    worker_count: u32,
    width: u32,
    height: u32,
    _handle: HostHandle,
}

/// Sequential CPU device
#[derive(Debug)]
pub struct HostBackend {
    // Field order is release order: queue, then context.
    _queue: HostHandle,
    _context: HostHandle,
    ledger: Rc<ResourceLedger>,
    dispatches: Cell<u64>,
    fail_after: Cell<Option<u64>>,
    binds: Cell<u64>,
    fail_bind_after: Cell<Option<u64>>,
}

impl HostBackend {
    pub fn new() -> Self {
        let ledger = Rc::new(ResourceLedger::default());
        let context = acquire(&ledger, ResourceKind::Context);
        let queue = acquire(&ledger, ResourceKind::Queue);
        Self {
            _queue: queue,
            _context: context,
            ledger,
            dispatches: Cell::new(0),
            fail_after: Cell::new(None),
            binds: Cell::new(0),
            fail_bind_after: Cell::new(None),
        }
    }

    /// Shared view of the ledger; stays readable after the backend is gone
    pub fn ledger(&self) -> Rc<ResourceLedger> {
        Rc::clone(&self.ledger)
    }

    /// Number of kernels launched so far
    pub fn dispatch_count(&self) -> u64 {
        self.dispatches.get()
    }

    /// Makes every launch after the first `launches` fail, for exercising the
    /// fatal-error path
    pub fn fail_dispatch_after(&self, launches: u64) {
        self.fail_after.set(Some(launches));
    }

    /// Makes every kernel binding after the first `bindings` fail
    pub fn fail_bind_after(&self, bindings: u64) {
        self.fail_bind_after.set(Some(bindings));
    }
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for HostBackend {
    type Buffer = HostBuffer;
    type Program = HostProgram;
    type Kernel = HostKernel;

    fn describe(&self) -> String {
        "host (sequential CPU)".to_string()
    }

    fn create_buffer(
        &self,
        label: &str,
        usage: BufferUsage,
        contents: &[u8],
    ) -> Result<HostBuffer> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(contents.len())
            .map_err(|e| LifeError::allocation(label, contents.len() as u64, e))?;
        bytes.extend_from_slice(contents);

        Ok(HostBuffer {
            storage: Rc::new(RefCell::new(bytes)),
            usage,
            _handle: acquire(&self.ledger, ResourceKind::Buffer),
        })
    }

    fn build_program(&self, source: &str, entry_point: &str) -> Result<HostProgram> {
        // The host carries its own compiled rendition of the kernel; the
        // source only has to declare the entry point it is asked for.
        if !source.contains(&format!("fn {}(", entry_point)) {
            return Err(LifeError::Compile {
                log: format!("error: entry point `{}` not found in source", entry_point),
            });
        }
        Ok(HostProgram {
            entry_point: entry_point.to_string(),
            _handle: acquire(&self.ledger, ResourceKind::Program),
        })
    }

    fn bind_kernel(
        &self,
        program: &HostProgram,
        label: &str,
        args: KernelArgs<'_, HostBuffer>,
    ) -> Result<HostKernel> {
        let bound = self.binds.get();
        if self.fail_bind_after.get().is_some_and(|limit| bound >= limit) {
            return Err(LifeError::Dispatch(format!(
                "{}: binding {} rejected by the device",
                label, bound
            )));
        }
        if Rc::ptr_eq(&args.source.storage, &args.destination.storage) {
            return Err(LifeError::Dispatch(format!(
                "{}: source and destination are the same buffer",
                label
            )));
        }
        let expected = [
            (args.source, BufferUsage::Cells),
            (args.destination, BufferUsage::Cells),
            (args.pixels, BufferUsage::Pixels),
            (args.worker_count, BufferUsage::Scalar),
            (args.width, BufferUsage::Scalar),
            (args.height, BufferUsage::Scalar),
        ];
        if let Some(position) = expected.iter().position(|(buf, usage)| buf.usage != *usage) {
            return Err(LifeError::Dispatch(format!(
                "{}: argument {} has the wrong buffer usage",
                label, position
            )));
        }

        log::trace!("binding {} to `{}`", label, program.entry_point);
        self.binds.set(bound + 1);

        Ok(HostKernel {
            label: label.to_string(),
            source: Rc::clone(&args.source.storage),
            destination: Rc::clone(&args.destination.storage),
            pixels: Rc::clone(&args.pixels.storage),
            worker_count: read_scalar(&args.worker_count.storage.borrow()),
            width: read_scalar(&args.width.storage.borrow()),
            height: read_scalar(&args.height.storage.borrow()),
            _handle: acquire(&self.ledger, ResourceKind::Kernel),
        })
    }

    fn enqueue(&self, kernel: &HostKernel, worker_count: u32) -> Result<()> {
        let launched = self.dispatches.get();
        if self.fail_after.get().is_some_and(|limit| launched >= limit) {
            return Err(LifeError::Dispatch(format!(
                "{}: device lost during launch {}",
                kernel.label, launched
            )));
        }
        if worker_count != kernel.worker_count {
            return Err(LifeError::Dispatch(format!(
                "{}: launched with {} workers but bound for {}",
                kernel.label, worker_count, kernel.worker_count
            )));
        }

        let source = kernel.source.borrow();
        let mut destination = kernel.destination.borrow_mut();
        let mut pixels = kernel.pixels.borrow_mut();
        for worker in 0..worker_count {
            kernel::run_worker(
                worker,
                worker_count,
                kernel.width,
                kernel.height,
                &source,
                &mut destination,
                &mut pixels,
            );
        }

        self.dispatches.set(launched + 1);
        Ok(())
    }

    fn read_buffer(&self, buffer: &HostBuffer, dst: &mut [u8]) -> Result<()> {
        let storage = buffer.storage.borrow();
        if dst.len() != storage.len() {
            return Err(LifeError::Dispatch(format!(
                "read-back of {} bytes into a {} byte destination",
                storage.len(),
                dst.len()
            )));
        }
        dst.copy_from_slice(&storage);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::scalar_bytes;

    #[test]
    fn test_ledger_tracks_buffers() {
        let backend = HostBackend::new();
        let ledger = backend.ledger();
        {
            let _a = backend
                .create_buffer("a", BufferUsage::Cells, &[0; 8])
                .unwrap();
            let _b = backend
                .create_buffer("b", BufferUsage::Cells, &[0; 8])
                .unwrap();
            assert_eq!(ledger.acquired(ResourceKind::Buffer), 2);
            assert_eq!(ledger.outstanding(), 4);
        }
        assert_eq!(ledger.released(ResourceKind::Buffer), 2);
        drop(backend);
        assert_eq!(ledger.outstanding(), 0);
        assert_eq!(
            ledger.release_order(),
            vec![ResourceKind::Buffer, ResourceKind::Queue, ResourceKind::Context]
        );
    }

    #[test]
    fn test_missing_entry_point_is_compile_error() {
        let backend = HostBackend::new();
        let err = backend.build_program("fn other() {}", "conway").unwrap_err();
        assert!(err.build_log().unwrap().contains("`conway`"));
        assert_eq!(backend.ledger().acquired(ResourceKind::Program), 0);
    }

    #[test]
    fn test_aliased_arguments_rejected() {
        let backend = HostBackend::new();
        let program = backend.build_program("fn conway() {}", "conway").unwrap();
        let cells = backend.create_buffer("cells", BufferUsage::Cells, &[0; 4]).unwrap();
        let pixels = backend.create_buffer("px", BufferUsage::Pixels, &[0; 16]).unwrap();
        let one = backend
            .create_buffer("one", BufferUsage::Scalar, &scalar_bytes(1))
            .unwrap();
        let args = KernelArgs {
            source: &cells,
            destination: &cells,
            pixels: &pixels,
            worker_count: &one,
            width: &one,
            height: &one,
        };
        assert!(matches!(
            backend.bind_kernel(&program, "aliased", args),
            Err(LifeError::Dispatch(_))
        ));
    }

    #[test]
    fn test_read_buffer_size_mismatch() {
        let backend = HostBackend::new();
        let buffer = backend
            .create_buffer("px", BufferUsage::Pixels, &[1, 2, 3, 4])
            .unwrap();
        let mut small = [0u8; 2];
        assert!(backend.read_buffer(&buffer, &mut small).is_err());
        let mut exact = [0u8; 4];
        backend.read_buffer(&buffer, &mut exact).unwrap();
        assert_eq!(exact, [1, 2, 3, 4]);
    }
}
