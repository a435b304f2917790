//! In-process registry implementing [`RegistryApi`].
//!
//! Mirrors the native behaviour the facade depends on: case-insensitive
//! names, per-handle access rights, handles that outlive deleted keys, and
//! the same status codes the OS returns. Hives can be marked invalid or
//! unimplemented, nodes can be protected against writes, and any primitive
//! can be made to fail.

use crate::api::{AccessMask, KeyInfo, RawKey, RegistryApi};
use crate::codec;
use crate::hive::Hive;
use crate::resolver::normalize;
use crate::status::{
    NativeResult, ERROR_ACCESS_DENIED, ERROR_CALL_NOT_IMPLEMENTED, ERROR_FILE_NOT_FOUND,
    ERROR_INVALID_HANDLE, ERROR_KEY_DELETED, ERROR_MORE_DATA, ERROR_NO_MORE_ITEMS,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// `REG_SZ`.
pub const REG_SZ: u32 = 1;
/// `REG_EXPAND_SZ`.
pub const REG_EXPAND_SZ: u32 = 2;
/// `REG_BINARY`.
pub const REG_BINARY: u32 = 3;
/// `REG_DWORD`.
pub const REG_DWORD: u32 = 4;

/// 2021-01-01T00:00:00Z as FILETIME.
const EPOCH_FILETIME: u64 = 132_539_328_000_000_000;

const FIRST_HANDLE: usize = 0x100;

/// Registry primitive, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    /// [`RegistryApi::open_key`].
    OpenKey,
    /// [`RegistryApi::close_key`].
    CloseKey,
    /// [`RegistryApi::query_info`].
    QueryInfo,
    /// [`RegistryApi::enum_key`].
    EnumKey,
    /// [`RegistryApi::enum_value`].
    EnumValue,
    /// [`RegistryApi::query_value`].
    QueryValue,
    /// [`RegistryApi::set_value`].
    SetValue,
    /// [`RegistryApi::create_key`].
    CreateKey,
    /// [`RegistryApi::delete_key`].
    DeleteKey,
    /// [`RegistryApi::delete_value`].
    DeleteValue,
}

#[derive(Debug, Clone)]
struct Fault {
    call: Call,
    skip: usize,
    code: u32,
}

#[derive(Debug, Clone)]
struct StoredValue {
    name: Vec<u8>,
    kind: u32,
    data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
struct Node {
    name: Vec<u8>,
    children: Vec<Node>,
    values: Vec<StoredValue>,
    last_written: u64,
    protected: bool,
}

impl Node {
    fn named(name: &[u8], last_written: u64) -> Self {
        Self {
            name: name.to_vec(),
            last_written,
            ..Self::default()
        }
    }

    fn child(&self, name: &[u8]) -> Option<&Node> {
        self.children.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn child_position(&self, name: &[u8]) -> Option<usize> {
        self.children.iter().position(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn value_position(&self, name: &[u8]) -> Option<usize> {
        self.values.iter().position(|v| v.name.eq_ignore_ascii_case(name))
    }

    fn descend_mut(&mut self, segments: &[Vec<u8>]) -> Option<&mut Node> {
        let mut node = self;
        for segment in segments {
            let pos = node.child_position(segment)?;
            node = &mut node.children[pos];
        }
        Some(node)
    }

    /// Returns the child `name`, creating it when absent.
    fn child_or_insert(&mut self, name: &[u8], last_written: u64) -> &mut Node {
        let pos = match self.child_position(name) {
            Some(pos) => pos,
            None => {
                self.children.push(Node::named(name, last_written));
                self.last_written = last_written;
                self.children.len() - 1
            }
        };
        &mut self.children[pos]
    }
}

#[derive(Debug, Clone)]
struct OpenKey {
    hive: Hive,
    segments: Vec<Vec<u8>>,
    access: AccessMask,
}

#[derive(Debug)]
struct State {
    roots: HashMap<Hive, Node>,
    hive_status: HashMap<Hive, u32>,
    handles: HashMap<usize, OpenKey>,
    next_handle: usize,
    close_calls: usize,
    faults: Vec<Fault>,
    clock: u64,
}

impl State {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        EPOCH_FILETIME + self.clock * 10_000_000
    }

    fn take_fault(&mut self, call: Call) -> NativeResult<()> {
        if let Some(pos) = self.faults.iter().position(|f| f.call == call) {
            let fault = &mut self.faults[pos];
            if fault.skip > 0 {
                fault.skip -= 1;
                return Ok(());
            }
            let code = fault.code;
            self.faults.remove(pos);
            return Err(code);
        }
        Ok(())
    }

    fn allocate(&mut self, key: OpenKey) -> RawKey {
        let id = self.next_handle;
        self.next_handle += 4;
        self.handles.insert(id, key);
        RawKey(id)
    }

    fn root(&self, hive: Hive) -> NativeResult<&Node> {
        if let Some(&code) = self.hive_status.get(&hive) {
            return Err(code);
        }
        self.roots.get(&hive).ok_or(ERROR_INVALID_HANDLE)
    }

    /// Node behind an open handle that was opened with `needed`.
    fn target(&mut self, key: RawKey, needed: AccessMask) -> NativeResult<&mut Node> {
        let open = self.handles.get(&key.0).ok_or(ERROR_INVALID_HANDLE)?.clone();
        if !open.access.contains(needed) {
            return Err(ERROR_ACCESS_DENIED);
        }
        self.roots
            .get_mut(&open.hive)
            .and_then(|root| root.descend_mut(&open.segments))
            .ok_or(ERROR_KEY_DELETED)
    }

    fn handle_of(&self, key: RawKey) -> NativeResult<OpenKey> {
        self.handles.get(&key.0).cloned().ok_or(ERROR_INVALID_HANDLE)
    }
}

/// Splits a native path or name into segments, dropping the terminator.
fn segments(native: &[u8]) -> Vec<Vec<u8>> {
    let end = native.iter().position(|&b| b == 0).unwrap_or(native.len());
    let native = &native[..end];
    if native.is_empty() {
        return Vec::new();
    }
    native.split(|&b| b == b'\\').map(<[u8]>::to_vec).collect()
}

fn strip_nul(native: &[u8]) -> &[u8] {
    let end = native.iter().position(|&b| b == 0).unwrap_or(native.len());
    &native[..end]
}

/// Thread-safe in-process registry.
#[derive(Debug)]
pub struct MemoryRegistry {
    state: Mutex<State>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistry {
    /// Creates an empty registry.
    ///
    /// `HKEY_DYN_DATA` reports "not implemented" and the performance hives
    /// report an invalid handle, as on current Windows versions.
    pub fn new() -> Self {
        let roots = Hive::ALL
            .iter()
            .map(|&hive| (hive, Node::named(b"", EPOCH_FILETIME)))
            .collect();
        let hive_status = HashMap::from([
            (Hive::DynData, ERROR_CALL_NOT_IMPLEMENTED),
            (Hive::PerformanceData, ERROR_INVALID_HANDLE),
            (Hive::PerformanceText, ERROR_INVALID_HANDLE),
            (Hive::PerformanceNlsText, ERROR_INVALID_HANDLE),
        ]);

        Self {
            state: Mutex::new(State {
                roots,
                hive_status,
                handles: HashMap::new(),
                next_handle: FIRST_HANDLE,
                close_calls: 0,
                faults: Vec::new(),
                clock: 0,
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory registry lock poisoned")
    }

    /// Makes every open under `hive` fail with `code`, or restores the hive
    /// when `code` is `None`.
    pub fn set_hive_status(&self, hive: Hive, code: Option<u32>) {
        let mut state = self.state();
        match code {
            Some(code) => state.hive_status.insert(hive, code),
            None => state.hive_status.remove(&hive),
        };
    }

    /// Creates `path` and every missing ancestor.
    pub fn insert_key(&self, hive: Hive, path: &str) {
        let native = codec::to_native_path(normalize(path));
        let mut state = self.state();
        let now = state.tick();
        if let Some(root) = state.roots.get_mut(&hive) {
            let mut node = root;
            for segment in segments(&native) {
                node = node.child_or_insert(&segment, now);
            }
        }
    }

    /// Stores a string value, creating the key when needed.
    pub fn insert_value(&self, hive: Hive, path: &str, name: &str, value: &str) {
        self.insert_raw_value(hive, path, name, REG_SZ, codec::to_native_value(value));
    }

    /// Stores a value of any type, creating the key when needed.
    pub fn insert_raw_value(&self, hive: Hive, path: &str, name: &str, kind: u32, data: Vec<u8>) {
        self.insert_key(hive, path);
        let path = segments(&codec::to_native_path(normalize(path)));
        let name = strip_nul(&codec::to_native(name)).to_vec();
        let mut state = self.state();
        let now = state.tick();
        if let Some(node) = state.roots.get_mut(&hive).and_then(|r| r.descend_mut(&path)) {
            let value = StoredValue { name, kind, data };
            match node.value_position(&value.name) {
                Some(pos) => node.values[pos] = value,
                None => node.values.push(value),
            }
            node.last_written = now;
        }
    }

    /// Denies write access to `path`: opening it with write rights fails with
    /// `ERROR_ACCESS_DENIED`, and so does deleting it.
    pub fn protect(&self, hive: Hive, path: &str) {
        self.insert_key(hive, path);
        let path = segments(&codec::to_native_path(normalize(path)));
        let mut state = self.state();
        if let Some(node) = state.roots.get_mut(&hive).and_then(|r| r.descend_mut(&path)) {
            node.protected = true;
        }
    }

    /// Fails the call after `skip` successful invocations of it with `code`.
    pub fn inject(&self, call: Call, skip: usize, code: u32) {
        self.state().faults.push(Fault { call, skip, code });
    }

    /// Number of handles currently open.
    pub fn open_handles(&self) -> usize {
        self.state().handles.len()
    }

    /// Number of close calls received, successful or not.
    pub fn close_calls(&self) -> usize {
        self.state().close_calls
    }
}

impl RegistryApi for MemoryRegistry {
    fn open_key(&self, hive: Hive, path: &[u8], access: AccessMask) -> NativeResult<RawKey> {
        let mut state = self.state();
        state.take_fault(Call::OpenKey)?;

        let root = state.root(hive)?;
        let mut node = root;
        let mut canonical = Vec::new();
        for segment in segments(path) {
            node = node.child(&segment).ok_or(ERROR_FILE_NOT_FOUND)?;
            canonical.push(node.name.clone());
        }
        if node.protected && access.intersects(AccessMask::WRITE_RIGHTS) {
            return Err(ERROR_ACCESS_DENIED);
        }

        Ok(state.allocate(OpenKey {
            hive,
            segments: canonical,
            access,
        }))
    }

    fn close_key(&self, key: RawKey) -> NativeResult<()> {
        let mut state = self.state();
        state.close_calls += 1;
        state.take_fault(Call::CloseKey)?;
        state
            .handles
            .remove(&key.0)
            .map(|_| ())
            .ok_or(ERROR_INVALID_HANDLE)
    }

    fn query_info(&self, key: RawKey) -> NativeResult<KeyInfo> {
        let mut state = self.state();
        state.take_fault(Call::QueryInfo)?;
        let node = state.target(key, AccessMask::QUERY_VALUE)?;

        Ok(KeyInfo {
            subkey_count: node.children.len() as u32,
            max_subkey_name_len: node
                .children
                .iter()
                .map(|c| c.name.len())
                .max()
                .unwrap_or(0) as u32,
            value_count: node.values.len() as u32,
            max_value_name_len: node
                .values
                .iter()
                .map(|v| v.name.len())
                .max()
                .unwrap_or(0) as u32,
            last_written: node.last_written,
        })
    }

    fn enum_key(&self, key: RawKey, index: u32, buffer_len: u32) -> NativeResult<Vec<u8>> {
        let mut state = self.state();
        state.take_fault(Call::EnumKey)?;
        let node = state.target(key, AccessMask::ENUMERATE_SUB_KEYS)?;
        let child = node.children.get(index as usize).ok_or(ERROR_NO_MORE_ITEMS)?;
        if child.name.len() + 1 > buffer_len as usize {
            return Err(ERROR_MORE_DATA);
        }
        Ok(child.name.clone())
    }

    fn enum_value(&self, key: RawKey, index: u32, buffer_len: u32) -> NativeResult<Vec<u8>> {
        let mut state = self.state();
        state.take_fault(Call::EnumValue)?;
        let node = state.target(key, AccessMask::QUERY_VALUE)?;
        let value = node.values.get(index as usize).ok_or(ERROR_NO_MORE_ITEMS)?;
        if value.name.len() + 1 > buffer_len as usize {
            return Err(ERROR_MORE_DATA);
        }
        Ok(value.name.clone())
    }

    fn query_value(&self, key: RawKey, name: &[u8]) -> NativeResult<Option<Vec<u8>>> {
        let mut state = self.state();
        state.take_fault(Call::QueryValue)?;
        let node = state.target(key, AccessMask::QUERY_VALUE)?;
        let pos = node.value_position(strip_nul(name)).ok_or(ERROR_FILE_NOT_FOUND)?;
        let value = &node.values[pos];
        match value.kind {
            REG_SZ | REG_EXPAND_SZ => Ok(Some(value.data.clone())),
            _ => Ok(None),
        }
    }

    fn set_value(&self, key: RawKey, name: &[u8], data: &[u8]) -> NativeResult<()> {
        let mut state = self.state();
        state.take_fault(Call::SetValue)?;
        let now = state.tick();
        let node = state.target(key, AccessMask::SET_VALUE)?;
        if node.protected {
            return Err(ERROR_ACCESS_DENIED);
        }

        let value = StoredValue {
            name: strip_nul(name).to_vec(),
            kind: REG_SZ,
            data: data.to_vec(),
        };
        match node.value_position(&value.name) {
            Some(pos) => node.values[pos] = value,
            None => node.values.push(value),
        }
        node.last_written = now;
        Ok(())
    }

    fn create_key(&self, key: RawKey, name: &[u8], access: AccessMask) -> NativeResult<RawKey> {
        let mut state = self.state();
        state.take_fault(Call::CreateKey)?;
        let parent = state.handle_of(key)?;
        let now = state.tick();

        let node = state.target(key, AccessMask::CREATE_SUB_KEY)?;
        if node.protected {
            return Err(ERROR_ACCESS_DENIED);
        }
        let mut canonical = parent.segments;
        let mut node = node;
        for segment in segments(name).into_iter().filter(|s| !s.is_empty()) {
            node = node.child_or_insert(&segment, now);
            canonical.push(node.name.clone());
        }

        Ok(state.allocate(OpenKey {
            hive: parent.hive,
            segments: canonical,
            access,
        }))
    }

    fn delete_key(&self, key: RawKey, name: &[u8]) -> NativeResult<()> {
        let mut state = self.state();
        state.take_fault(Call::DeleteKey)?;
        let now = state.tick();
        let node = state.target(key, AccessMask::DELETE)?;
        let pos = node.child_position(strip_nul(name)).ok_or(ERROR_FILE_NOT_FOUND)?;

        let child = &node.children[pos];
        if child.protected || !child.children.is_empty() {
            return Err(ERROR_ACCESS_DENIED);
        }
        node.children.remove(pos);
        node.last_written = now;
        Ok(())
    }

    fn delete_value(&self, key: RawKey, name: &[u8]) -> NativeResult<()> {
        let mut state = self.state();
        state.take_fault(Call::DeleteValue)?;
        let now = state.tick();
        let node = state.target(key, AccessMask::SET_VALUE)?;
        if node.protected {
            return Err(ERROR_ACCESS_DENIED);
        }
        let pos = node.value_position(strip_nul(name)).ok_or(ERROR_FILE_NOT_FOUND)?;
        node.values.remove(pos);
        node.last_written = now;
        Ok(())
    }
}
