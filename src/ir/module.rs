//! IR module & symbol registry (spec component C9). Grounded on `TB_Module`
//! in `tb_internal.h`: thread-sharded pools for globals/externals, a flat
//! function list, atomic per-tag symbol counts, and the four standard
//! sections (`text, data, rdata, tls`).
//!
//! `tb_internal.h` links symbols of a tag together with a raw
//! compare-and-swap loop over `first_symbol_of_tag[tag]`, each symbol
//! carrying its own `next` pointer. This crate has no use for raw pointers
//! anywhere else (arena handles replace them throughout, see `handle.rs`),
//! so the chain is represented here as a mutex-guarded append-only `Vec`
//! per tag instead of a hand-rolled intrusive list: the externally visible
//! contract is identical (append-only, "snapshot-consistent only after all
//! writers have quiesced", §4.7) without introducing `unsafe`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::ir::symbol::{
  ExternalH, ExternalRecord, FunctionH, FunctionRecord, GlobalH, GlobalRecord, InitObject,
  Linkage, SymbolId, SymbolTag, SYMBOL_TAG_COUNT,
};
use crate::types::TypeH;
use crate::types::ast::StmtH;

/// Which of the four standard sections a global or the code stream belongs
/// to, mirroring `TB_ModuleSectionKind`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SectionKind {
  Text,
  Data,
  Rdata,
  Tls,
}

/// One of the module's four standard sections. Layout/export bookkeeping
/// (`raw_data_pos`, relocation counts, ...) is codegen/linker territory and
/// out of scope here; this crate only needs the section identity that a
/// `Global`'s storage class maps onto.
#[derive(Clone, Debug)]
pub struct Section {
  pub kind: SectionKind,
  pub name: &'static str,
}

struct Sections {
  text: Section,
  data: Section,
  rdata: Section,
  tls: Section,
}

impl Sections {
  fn new() -> Self {
    Self {
      text: Section { kind: SectionKind::Text, name: ".text" },
      data: Section { kind: SectionKind::Data, name: ".data" },
      rdata: Section { kind: SectionKind::Rdata, name: ".rdata" },
      tls: Section { kind: SectionKind::Tls, name: ".tls" },
    }
  }
}

/// The IR module: the shared destination every top-level declaration lowers
/// into (spec.md §3/§4.7). Registration is safe to call from multiple
/// worker threads concurrently, one per translation unit (§5); ordering
/// between translation units is explicitly unspecified.
pub struct Module {
  workers: usize,
  functions: Mutex<Vec<FunctionRecord>>,
  globals: Vec<Mutex<Vec<GlobalRecord>>>,
  externals: Vec<Mutex<Vec<ExternalRecord>>>,
  symbol_count: [AtomicUsize; SYMBOL_TAG_COUNT],
  first_symbol_of_tag: [Mutex<Vec<SymbolId>>; SYMBOL_TAG_COUNT],
  sections: Sections,
}

impl Module {
  /// A fresh, empty module sized for `workers` concurrent translation-unit
  /// workers (spec.md §5: "the driver schedules one worker per translation
  /// unit").
  ///
  /// # Panics
  /// Panics if `workers` is zero; a module with no worker shards can never
  /// register a global or an external.
  #[must_use]
  pub fn new(workers: usize) -> Self {
    assert!(workers > 0, "a module needs at least one worker shard");
    Self {
      workers,
      functions: Mutex::new(Vec::new()),
      globals: (0..workers).map(|_| Mutex::new(Vec::new())).collect(),
      externals: (0..workers).map(|_| Mutex::new(Vec::new())).collect(),
      symbol_count: std::array::from_fn(|_| AtomicUsize::new(0)),
      first_symbol_of_tag: std::array::from_fn(|_| Mutex::new(Vec::new())),
      sections: Sections::new(),
    }
  }

  #[must_use] pub fn workers(&self) -> usize { self.workers }

  /// Current count of registered symbols of one tag (`symbol_count[tag]`).
  #[must_use] pub fn symbol_count(&self, tag: SymbolTag) -> usize {
    self.symbol_count[tag.index()].load(Ordering::Relaxed)
  }

  fn record(&self, id: SymbolId) {
    self.symbol_count[id.tag().index()].fetch_add(1, Ordering::Relaxed);
    self.first_symbol_of_tag[id.tag().index()].lock().expect("module lock poisoned").push(id);
  }

  /// Register a `Function` symbol (C7: "Register the `Function` in the IR
  /// module"). Allocation is a plain append since functions are not
  /// thread-sharded (unlike globals/externals, `tb_internal.h`'s
  /// `TB_Module` has no per-thread `Pool(TB_Function)`).
  pub fn register_function(&self, name: String, linkage: Linkage, proto: TypeH, body: StmtH) -> FunctionH {
    let mut functions = self.functions.lock().expect("module lock poisoned");
    let handle = FunctionH::from_usize(functions.len());
    functions.push(FunctionRecord { name, linkage, proto, body });
    drop(functions);
    self.record(SymbolId::Function(handle));
    handle
  }

  /// Register a `Global` symbol from worker `worker`'s pool (C7: "Create a
  /// `Global` with chosen linkage").
  ///
  /// # Panics
  /// Panics if `worker` is out of range for this module's worker count.
  pub fn register_global(&self, worker: usize, name: String, linkage: Linkage, ty: TypeH, size: u64, align: u64, objects: Vec<InitObject>) -> GlobalH {
    let mut pool = self.globals[worker].lock().expect("module lock poisoned");
    let slot = u32::try_from(pool.len()).expect("global pool overflow");
    pool.push(GlobalRecord { name, linkage, ty, size, align, objects });
    drop(pool);
    let handle = GlobalH { worker: u32::try_from(worker).expect("worker index overflow"), slot };
    self.record(SymbolId::Global(handle));
    handle
  }

  /// Register an `External` symbol from worker `worker`'s pool (C7: "register
  /// an `External`").
  ///
  /// # Panics
  /// Panics if `worker` is out of range for this module's worker count.
  pub fn register_external(&self, worker: usize, name: String, linkage: Linkage, ty: TypeH) -> ExternalH {
    let mut pool = self.externals[worker].lock().expect("module lock poisoned");
    let slot = u32::try_from(pool.len()).expect("external pool overflow");
    pool.push(ExternalRecord { name, linkage, ty });
    drop(pool);
    let handle = ExternalH { worker: u32::try_from(worker).expect("worker index overflow"), slot };
    self.record(SymbolId::External(handle));
    handle
  }

  /// Look up a registered function by handle.
  pub fn with_function<R>(&self, h: FunctionH, f: impl FnOnce(&FunctionRecord) -> R) -> R {
    f(&self.functions.lock().expect("module lock poisoned")[h.into_usize()])
  }

  /// Look up a registered global by handle.
  pub fn with_global<R>(&self, h: GlobalH, f: impl FnOnce(&GlobalRecord) -> R) -> R {
    f(&self.globals[h.worker as usize].lock().expect("module lock poisoned")[h.slot as usize])
  }

  /// Look up a registered external by handle.
  pub fn with_external<R>(&self, h: ExternalH, f: impl FnOnce(&ExternalRecord) -> R) -> R {
    f(&self.externals[h.worker as usize].lock().expect("module lock poisoned")[h.slot as usize])
  }

  /// Snapshot the `TB_FOR_FUNCTIONS` traversal order. Valid once all
  /// registering workers have quiesced (§4.7); concurrent iteration with
  /// active writers is unspecified, matching the original's contract.
  #[must_use] pub fn function_ids(&self) -> Vec<FunctionH> {
    self.first_symbol_of_tag[SymbolTag::Function.index()]
      .lock()
      .expect("module lock poisoned")
      .iter()
      .map(|id| match id { SymbolId::Function(h) => *h, _ => unreachable!("tag-indexed list holds only its own tag") })
      .collect()
  }

  /// Snapshot the `TB_FOR_GLOBALS` traversal order.
  #[must_use] pub fn global_ids(&self) -> Vec<GlobalH> {
    self.first_symbol_of_tag[SymbolTag::Global.index()]
      .lock()
      .expect("module lock poisoned")
      .iter()
      .map(|id| match id { SymbolId::Global(h) => *h, _ => unreachable!("tag-indexed list holds only its own tag") })
      .collect()
  }

  /// Snapshot the `TB_FOR_EXTERNALS` traversal order.
  #[must_use] pub fn external_ids(&self) -> Vec<ExternalH> {
    self.first_symbol_of_tag[SymbolTag::External.index()]
      .lock()
      .expect("module lock poisoned")
      .iter()
      .map(|id| match id { SymbolId::External(h) => *h, _ => unreachable!("tag-indexed list holds only its own tag") })
      .collect()
  }

  #[must_use] pub fn text_section(&self) -> &Section { &self.sections.text }
  #[must_use] pub fn data_section(&self) -> &Section { &self.sections.data }
  #[must_use] pub fn rdata_section(&self) -> &Section { &self.sections.rdata }
  #[must_use] pub fn tls_section(&self) -> &Section { &self.sections.tls }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diag::SourceLoc;
  use crate::types::TypeStore;

  fn dummy_proto(ts: &mut TypeStore) -> TypeH { ts.int(false) }

  #[test]
  fn registering_a_function_assigns_public_linkage_and_counts_it() {
    let mut ts = TypeStore::new();
    let mut ast = crate::types::ast::AstStore::new();
    let module = Module::new(2);
    let proto = dummy_proto(&mut ts);
    let body = ast.push_stmt(crate::types::ast::StmtKind::Break, SourceLoc(0));
    let h = module.register_function("main".to_string(), Linkage::Public, proto, body);
    assert_eq!(module.symbol_count(SymbolTag::Function), 1);
    module.with_function(h, |f| assert_eq!(f.name, "main"));
    assert_eq!(module.function_ids(), vec![h]);
  }

  #[test]
  fn globals_are_sharded_by_worker() {
    let mut ts = TypeStore::new();
    let module = Module::new(2);
    let ty = dummy_proto(&mut ts);
    let a = module.register_global(0, "a".to_string(), Linkage::Private, ty, 4, 4, vec![]);
    let b = module.register_global(1, "b".to_string(), Linkage::Public, ty, 4, 4, vec![]);
    assert_eq!(a.worker, 0);
    assert_eq!(b.worker, 1);
    assert_eq!(module.symbol_count(SymbolTag::Global), 2);
    let ids = module.global_ids();
    assert!(ids.contains(&a) && ids.contains(&b));
  }

  #[test]
  #[should_panic(expected = "at least one worker shard")]
  fn zero_workers_panics() {
    Module::new(0);
  }

  #[test]
  fn n_concurrent_workers_registering_m_globals_each_produce_exactly_n_times_m_entries() {
    use std::sync::Arc;
    use std::thread;

    const WORKERS: usize = 4;
    const PER_WORKER: usize = 50;

    let mut ts = TypeStore::new();
    let proto = dummy_proto(&mut ts);
    let module = Arc::new(Module::new(WORKERS));

    let handles: Vec<_> = (0..WORKERS)
      .map(|w| {
        let module = Arc::clone(&module);
        thread::spawn(move || {
          for i in 0..PER_WORKER {
            module.register_global(w, format!("g{w}_{i}"), Linkage::Private, proto, 4, 4, vec![]);
          }
        })
      })
      .collect();
    for h in handles { h.join().expect("worker thread panicked"); }

    assert_eq!(module.symbol_count(SymbolTag::Global), WORKERS * PER_WORKER);
    assert_eq!(module.global_ids().len(), WORKERS * PER_WORKER);
  }
}
