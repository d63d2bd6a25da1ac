use std::sync::Arc;

use ncfactory_primitives::{NcError, Result};

use super::Registry;
use crate::factory::{Factory, FactoryRequest};

impl Registry {
	/// Chooses the factory that serves `request`.
	///
	/// A factory named by the request must exist and accept it, otherwise the
	/// result is `CalcError`. Without a forced name the highest priority among
	/// the factories accepting the request wins, earliest registration first
	/// on ties. With no candidate the request's own "no match" error is
	/// returned.
	pub fn select<R: FactoryRequest>(&self, request: &R) -> Result<Arc<dyn Factory<R>>> {
		self.ensure_loaded();
		let factories = R::table(&self.factories).snapshot();

		if let Some(forced) = request.forced_factory() {
			let Some(factory) = factories.iter().find(|f| f.name() == forced) else {
				return Err(NcError::calc(format!(
					"requested {} factory \"{forced}\" is not available (have: {})",
					R::KIND,
					join_names(&factories)
				)));
			};
			if !factory.can_handle(request) {
				return Err(NcError::calc(format!(
					"requested {} factory \"{forced}\" cannot handle {}",
					R::KIND,
					request.describe()
				)));
			}
			return Ok(Arc::clone(factory));
		}

		let mut best: Option<&Arc<dyn Factory<R>>> = None;
		for factory in factories.iter() {
			if !factory.can_handle(request) {
				continue;
			}
			match best {
				Some(current) if factory.priority() <= current.priority() => {}
				_ => best = Some(factory),
			}
		}

		match best {
			Some(factory) => {
				tracing::trace!(kind = %R::KIND, factory = factory.name(), request = %request.describe(), "selected factory");
				Ok(Arc::clone(factory))
			}
			None => Err(request.no_match(format!(
				"no {} factory can handle {} (have: {})",
				R::KIND,
				request.describe(),
				join_names(&factories)
			))),
		}
	}

	/// Validates `request`, selects a factory for it and has it produce the
	/// result.
	pub fn create<R: FactoryRequest>(&self, request: &R) -> Result<R::Product> {
		request.check()?;
		self.select(request)?.produce(request)
	}
}

fn join_names<R: FactoryRequest>(factories: &[Arc<dyn Factory<R>>]) -> String {
	if factories.is_empty() {
		return "none".to_string();
	}
	factories.iter().map(|f| f.name()).collect::<Vec<_>>().join(", ")
}
