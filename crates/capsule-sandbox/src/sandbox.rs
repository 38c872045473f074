//! Loading executable units and rendering their default export.

use std::ffi::c_void;
use std::fmt;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use capsule_transform::ExecutableUnit;

use crate::console::register_console;
use crate::error::{LoadError, RenderError, SandboxError};
use crate::platform::initialize_platform;
use crate::registry::{DependencyRegistry, FRAMEWORK, RENDERER_SOURCE};
use crate::watchdog::Watchdog;

/// Message of the exception held by a `TryCatch` scope.
macro_rules! caught_message {
    ($scope:expr) => {
        match $scope.exception() {
            Some(exception) => exception_message($scope, exception),
            None => String::from("Unknown error"),
        }
    };
}

/// Resource limits for one sandbox.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Wall-clock budget for a single load or render
    pub timeout: Duration,

    /// Maximum V8 heap size in bytes
    pub max_heap_bytes: usize,

    /// Forward `console.*` calls to the log
    pub capture_console: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            max_heap_bytes: 128 * 1024 * 1024,
            capture_console: true,
        }
    }
}

/// The default export of a loaded unit.
///
/// Only meaningful to the sandbox that produced it.
pub struct Component {
    value: v8::Global<v8::Value>,
    name: Option<String>,
}

impl Component {
    /// Declared name of the exported function or class, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component").field("name", &self.name).finish()
    }
}

/// Shared with the near-heap-limit callback of one isolate.
struct HeapGuard {
    handle: v8::IsolateHandle,
    exceeded: AtomicBool,
}

/// Stops the running script when the isolate approaches its heap limit.
///
/// The returned limit leaves room for V8 to unwind the terminated script
/// instead of aborting the process.
extern "C" fn near_heap_limit(
    data: *mut c_void,
    current_heap_limit: usize,
    _initial_heap_limit: usize,
) -> usize {
    // SAFETY: `data` is the `HeapGuard` boxed in the owning `Sandbox`, which
    // outlives the isolate.
    let guard = unsafe { &*(data as *const HeapGuard) };
    guard.exceeded.store(true, Ordering::SeqCst);
    guard.handle.terminate_execution();
    current_heap_limit.saturating_mul(2)
}

/// One V8 isolate with the dependency registry and static renderer loaded.
///
/// Isolates are bound to the thread that created them, so a sandbox must stay
/// on one thread for its whole life.
pub struct Sandbox {
    context: v8::Global<v8::Context>,
    framework: v8::Global<v8::Value>,
    registry: v8::Global<v8::Object>,
    create_element: v8::Global<v8::Function>,
    renderer: v8::Global<v8::Function>,
    config: SandboxConfig,
    // Every handle above must be released before the isolate.
    isolate: v8::OwnedIsolate,
    // Referenced by the isolate's heap callback, so dropped after it.
    heap: Box<HeapGuard>,
}

impl Sandbox {
    /// Create an isolate and evaluate the registry modules and renderer.
    pub fn new(config: SandboxConfig) -> Result<Self, SandboxError> {
        initialize_platform().map_err(SandboxError::Platform)?;

        let params = v8::CreateParams::default().heap_limits(0, config.max_heap_bytes);
        let mut isolate = v8::Isolate::new(params);
        let heap = Box::new(HeapGuard {
            handle: isolate.thread_safe_handle(),
            exceeded: AtomicBool::new(false),
        });
        isolate.add_near_heap_limit_callback(near_heap_limit, heap_data(&heap));

        let (context, framework, registry, create_element, renderer) = {
            let scope = pin!(v8::HandleScope::new(&mut isolate));
            let scope = &mut scope.init();
            let context = v8::Context::new(scope, Default::default());
            let global_context = v8::Global::new(scope, context);
            let scope = &mut v8::ContextScope::new(scope, context);

            if config.capture_console {
                register_console(scope)
                    .ok_or_else(|| SandboxError::bootstrap("console", "failed to install"))?;
            }

            // Receives the framework's dispatcher hook. Only the renderer sees it.
            let host = v8::Object::new(scope);
            let host: v8::Local<'_, v8::Value> = host.into();
            let host = v8::Global::new(scope, host);

            let framework_source = DependencyRegistry::source(FRAMEWORK)
                .ok_or_else(|| SandboxError::bootstrap(FRAMEWORK, "missing from registry"))?;
            let framework = evaluate_module(scope, FRAMEWORK, framework_source, &[&host])?;

            let table = v8::Object::new(scope);
            for (name, source) in DependencyRegistry::entries() {
                let module = if name == FRAMEWORK {
                    framework.clone()
                } else {
                    evaluate_module(scope, name, source, &[&framework])?
                };

                let key = v8::String::new(scope, name)
                    .ok_or_else(|| SandboxError::bootstrap(name, "invalid specifier"))?;
                let module = v8::Local::new(scope, &module);
                table.set(scope, key.into(), module);
            }
            let registry = v8::Global::new(scope, table);

            let create_element = member_function(scope, &framework, FRAMEWORK, "createElement")?;
            let renderer_module =
                evaluate_module(scope, "renderer", RENDERER_SOURCE, &[&framework, &host])?;
            let renderer =
                member_function(scope, &renderer_module, "renderer", "renderToStaticMarkup")?;

            (global_context, framework, registry, create_element, renderer)
        };

        tracing::debug!(
            timeout_ms = config.timeout.as_millis() as u64,
            max_heap_bytes = config.max_heap_bytes,
            "Sandbox ready"
        );

        Ok(Self {
            context,
            framework,
            registry,
            create_element,
            renderer,
            config,
            isolate,
            heap,
        })
    }

    /// Execute a unit and extract its default export.
    ///
    /// Every call gets a fresh export sink, so nothing leaks between units.
    pub fn load(&mut self, unit: &ExecutableUnit) -> Result<Component, LoadError> {
        let watchdog = Watchdog::arm(self.isolate.thread_safe_handle(), self.config.timeout);
        let outcome = self.load_unguarded(unit);
        watchdog.disarm();
        self.isolate.cancel_terminate_execution();
        let outcome = if self.recover_heap() {
            Err(LoadError::HeapLimit(self.config.max_heap_bytes))
        } else {
            outcome
        };

        match &outcome {
            Ok(component) => tracing::debug!(component = ?component.name(), "Loaded unit"),
            Err(e) => tracing::debug!("Load failed: {}", e),
        }
        outcome
    }

    /// Render a loaded component to static HTML.
    pub fn render(&mut self, component: &Component) -> Result<String, RenderError> {
        let watchdog = Watchdog::arm(self.isolate.thread_safe_handle(), self.config.timeout);
        let outcome = self.render_unguarded(component);
        watchdog.disarm();
        self.isolate.cancel_terminate_execution();
        if self.recover_heap() {
            return Err(RenderError::HeapLimit(self.config.max_heap_bytes));
        }
        outcome
    }

    /// Restore the heap limit after the heap callback stopped a script.
    ///
    /// Returns whether the last call was stopped that way.
    fn recover_heap(&mut self) -> bool {
        if !self.heap.exceeded.swap(false, Ordering::SeqCst) {
            return false;
        }

        self.isolate
            .remove_near_heap_limit_callback(near_heap_limit, self.config.max_heap_bytes);
        self.isolate.low_memory_notification();
        self.isolate
            .add_near_heap_limit_callback(near_heap_limit, heap_data(&self.heap));

        tracing::warn!(
            max_heap_bytes = self.config.max_heap_bytes,
            "Script stopped at the heap limit"
        );
        true
    }

    fn load_unguarded(&mut self, unit: &ExecutableUnit) -> Result<Component, LoadError> {
        let timeout = self.config.timeout;

        let scope = pin!(v8::HandleScope::new(&mut self.isolate));
        let scope = &mut scope.init();
        let context = v8::Local::new(scope, &self.context);
        let scope = &mut v8::ContextScope::new(scope, context);

        let framework = v8::Local::new(scope, &self.framework);
        let table = v8::Local::new(scope, &self.registry);
        let exports = v8::Object::new(scope);
        let require = v8::Function::builder(resolve_dependency)
            .data(table.into())
            .build(scope)
            .ok_or_else(|| LoadError::Compile("Failed to create resolver".to_string()))?;

        let wrapped = format!(
            "(function (React, require, exports) {{\n{}\n}})",
            unit.as_str()
        );
        let code = v8::String::new(scope, &wrapped)
            .ok_or_else(|| LoadError::Compile("Executable unit is too large".to_string()))?;

        let scope = pin!(v8::TryCatch::new(scope));
        let scope = &mut scope.init();

        let script = match v8::Script::compile(scope, code, None) {
            Some(script) => script,
            None => {
                if scope.has_terminated() {
                    return Err(LoadError::Timeout(timeout));
                }
                return Err(LoadError::Compile(caught_message!(scope)));
            }
        };

        let factory = match script.run(scope) {
            Some(factory) => factory,
            None => {
                if scope.has_terminated() {
                    return Err(LoadError::Timeout(timeout));
                }
                return Err(LoadError::Compile(caught_message!(scope)));
            }
        };
        let factory = v8::Local::<v8::Function>::try_from(factory)
            .map_err(|_| LoadError::Compile("Executable unit is not a script body".to_string()))?;

        let receiver = v8::undefined(scope).into();
        let bindings = [framework, require.into(), exports.into()];
        if factory.call(scope, receiver, &bindings).is_none() {
            if scope.has_terminated() {
                return Err(LoadError::Timeout(timeout));
            }
            return Err(LoadError::Thrown(caught_message!(scope)));
        }

        let key = v8::String::new(scope, "default")
            .ok_or_else(|| LoadError::Thrown("Failed to read exports".to_string()))?;
        let value = match exports.get(scope, key.into()) {
            Some(value) => value,
            None => {
                if scope.has_terminated() {
                    return Err(LoadError::Timeout(timeout));
                }
                return Err(LoadError::Thrown(caught_message!(scope)));
            }
        };

        if value.is_null_or_undefined() {
            return Err(LoadError::MissingExport);
        }

        let name = v8::Local::<v8::Function>::try_from(value)
            .ok()
            .map(|function| function.get_name(scope).to_rust_string_lossy(scope))
            .filter(|name| !name.is_empty());

        Ok(Component {
            value: v8::Global::new(scope, value),
            name,
        })
    }

    fn render_unguarded(&mut self, component: &Component) -> Result<String, RenderError> {
        let timeout = self.config.timeout;

        let scope = pin!(v8::HandleScope::new(&mut self.isolate));
        let scope = &mut scope.init();
        let context = v8::Local::new(scope, &self.context);
        let scope = &mut v8::ContextScope::new(scope, context);

        let framework = v8::Local::new(scope, &self.framework);
        let create_element = v8::Local::new(scope, &self.create_element);
        let renderer = v8::Local::new(scope, &self.renderer);
        let value = v8::Local::new(scope, &component.value);

        let scope = pin!(v8::TryCatch::new(scope));
        let scope = &mut scope.init();

        let props = v8::null(scope).into();
        let element = match create_element.call(scope, framework, &[value, props]) {
            Some(element) => element,
            None => {
                if scope.has_terminated() {
                    return Err(RenderError::Timeout(timeout));
                }
                return Err(RenderError::Thrown(caught_message!(scope)));
            }
        };

        let receiver = v8::undefined(scope).into();
        let markup = match renderer.call(scope, receiver, &[element]) {
            Some(markup) => markup,
            None => {
                if scope.has_terminated() {
                    return Err(RenderError::Timeout(timeout));
                }
                return Err(RenderError::Thrown(caught_message!(scope)));
            }
        };

        match markup.to_string(scope) {
            Some(markup) => Ok(markup.to_rust_string_lossy(scope)),
            None => Err(RenderError::Thrown(caught_message!(scope))),
        }
    }
}

impl fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sandbox")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn heap_data(guard: &HeapGuard) -> *mut c_void {
    guard as *const HeapGuard as *mut c_void
}

/// Evaluate a registry module factory and call it with `args`.
fn evaluate_module(
    scope: &mut v8::ContextScope<'_, '_, v8::HandleScope<'_>>,
    name: &str,
    source: &str,
    args: &[&v8::Global<v8::Value>],
) -> Result<v8::Global<v8::Value>, SandboxError> {
    let code = v8::String::new(scope, source)
        .ok_or_else(|| SandboxError::bootstrap(name, "module source is too large"))?;
    let args: Vec<v8::Local<'_, v8::Value>> =
        args.iter().map(|arg| v8::Local::new(scope, *arg)).collect();

    let scope = pin!(v8::TryCatch::new(scope));
    let scope = &mut scope.init();

    let Some(script) = v8::Script::compile(scope, code, None) else {
        return Err(SandboxError::bootstrap(name, caught_message!(scope)));
    };
    let Some(factory) = script.run(scope) else {
        return Err(SandboxError::bootstrap(name, caught_message!(scope)));
    };
    let factory = v8::Local::<v8::Function>::try_from(factory)
        .map_err(|_| SandboxError::bootstrap(name, "source must evaluate to a function"))?;

    let receiver = v8::undefined(scope).into();
    let Some(module) = factory.call(scope, receiver, &args) else {
        return Err(SandboxError::bootstrap(name, caught_message!(scope)));
    };

    Ok(v8::Global::new(scope, module))
}

/// Look up a function property on an evaluated module.
fn member_function(
    scope: &mut v8::ContextScope<'_, '_, v8::HandleScope<'_>>,
    module: &v8::Global<v8::Value>,
    module_name: &str,
    member: &str,
) -> Result<v8::Global<v8::Function>, SandboxError> {
    let module = v8::Local::new(scope, module);
    let object = v8::Local::<v8::Object>::try_from(module)
        .map_err(|_| SandboxError::bootstrap(module_name, "module is not an object"))?;
    let key = v8::String::new(scope, member)
        .ok_or_else(|| SandboxError::bootstrap(module_name, "invalid member name"))?;
    let value = object
        .get(scope, key.into())
        .ok_or_else(|| SandboxError::bootstrap(module_name, format!("cannot read `{member}`")))?;
    let function = v8::Local::<v8::Function>::try_from(value)
        .map_err(|_| SandboxError::bootstrap(module_name, format!("`{member}` is not a function")))?;

    Ok(v8::Global::new(scope, function))
}

/// The `require` binding handed to every unit.
///
/// Only specifiers in the registry resolve; anything else throws.
fn resolve_dependency(
    scope: &mut v8::PinScope<'_, '_>,
    args: v8::FunctionCallbackArguments<'_>,
    mut rv: v8::ReturnValue<'_>,
) {
    let requested = args.get(0);
    let name = if requested.is_string() {
        requested
            .to_string(scope)
            .map(|name| name.to_rust_string_lossy(scope))
            .unwrap_or_default()
    } else {
        String::new()
    };

    if !DependencyRegistry::contains(&name) {
        let shown = if requested.is_string() {
            name
        } else {
            requested
                .to_string(scope)
                .map(|shown| shown.to_rust_string_lossy(scope))
                .unwrap_or_default()
        };
        throw_error(scope, &DependencyRegistry::unresolved_message(&shown));
        return;
    }

    let Ok(table) = v8::Local::<v8::Object>::try_from(args.data()) else {
        throw_error(scope, "Dependency registry is unavailable");
        return;
    };
    let Some(key) = v8::String::new(scope, &name) else {
        throw_error(scope, &DependencyRegistry::unresolved_message(&name));
        return;
    };

    match table.get(scope, key.into()) {
        Some(module) => rv.set(module),
        None => throw_error(scope, &DependencyRegistry::unresolved_message(&name)),
    }
}

fn throw_error(scope: &mut v8::PinScope<'_, '_>, message: &str) {
    if let Some(message) = v8::String::new(scope, message) {
        let error = v8::Exception::error(scope, message);
        scope.throw_exception(error);
    }
}

/// Human-readable message for a thrown value.
///
/// Errors contribute their `message`; anything else is stringified.
fn exception_message(scope: &mut v8::PinScope<'_, '_>, exception: v8::Local<'_, v8::Value>) -> String {
    if let Ok(object) = v8::Local::<v8::Object>::try_from(exception) {
        if let Some(key) = v8::String::new(scope, "message") {
            if let Some(message) = object.get(scope, key.into()) {
                if message.is_string() {
                    if let Some(message) = message.to_string(scope) {
                        let message = message.to_rust_string_lossy(scope);
                        if !message.is_empty() {
                            return message;
                        }
                    }
                }
            }
        }
    }

    exception
        .to_string(scope)
        .map(|text| text.to_rust_string_lossy(scope))
        .unwrap_or_else(|| String::from("Unknown error"))
}
