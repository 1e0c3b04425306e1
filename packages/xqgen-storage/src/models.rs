/// A function documentation point as stored in the vector index.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionRecord {
	pub name: String,
	pub signature: String,
	pub description: String,
	pub return_type: String,
	pub module_name: String,
	pub module_uri: String,
	pub score: f32,
}
