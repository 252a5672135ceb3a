// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Kernel-level operations: the compiled form of one statement. Every
//! op reads immutable views and produces one fresh output stripe; a
//! runtime fault (an integer division hitting zero despite the typed
//! bounds) surfaces as an execution failure, never a panic.

use std::collections::BTreeMap;

use femtocode_columnar::ArrayBuffer;
use femtocode_lang::Statement;
use femtocode_type::{ColumnName, Dtype, Result, error::Diagnostic, internal_error};

use crate::kernel::{
	Workspace,
	explode::{DataExplode, EntryWalker, SizeProduct},
};

fn execution_failure(message: String) -> femtocode_type::Error {
	Diagnostic::new("EXEC_001", message).with_label("failure during kernel execution").into()
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointwiseOp {
	Add,
	Sub,
	Mul,
	Div,
	FloorDiv,
	Mod,
	Pow,
	UPlus,
	UMinus,
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
	And,
	Or,
	Not,
	If,
	IfTag {
		tag_true: i64,
		tag_false: i64,
	},
	IfData {
		on_true: bool,
	},
	IsTag {
		matching: Vec<i64>,
	},
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
	Pointwise {
		to: ColumnName,
		dtype: Dtype,
		op: PointwiseOp,
		args: Vec<ColumnName>,
	},
	Explode {
		to: ColumnName,
		dtype: Dtype,
		data: ColumnName,
		tosize: ColumnName,
		depth: usize,
	},
	ExplodeSize {
		to: ColumnName,
		sizes: Vec<ColumnName>,
	},
	ExplodeData {
		to: ColumnName,
		dtype: Dtype,
		data: ColumnName,
		fromsize: ColumnName,
		tosizes: Vec<ColumnName>,
	},
	GetFixed {
		to: ColumnName,
		dtype: Dtype,
		data: ColumnName,
		index: ColumnName,
		stride: usize,
	},
	SliceFixed {
		to: ColumnName,
		dtype: Dtype,
		data: ColumnName,
		start: i64,
		step: i64,
		length: usize,
		stride: usize,
	},
}

fn parse_pointwise(function: &str) -> Result<Option<PointwiseOp>> {
	Ok(Some(match function {
		"add" => PointwiseOp::Add,
		"sub" => PointwiseOp::Sub,
		"mul" => PointwiseOp::Mul,
		"div" => PointwiseOp::Div,
		"floordiv" => PointwiseOp::FloorDiv,
		"mod" => PointwiseOp::Mod,
		"pow" => PointwiseOp::Pow,
		"uplus" => PointwiseOp::UPlus,
		"uminus" => PointwiseOp::UMinus,
		"eq" => PointwiseOp::Eq,
		"ne" => PointwiseOp::Ne,
		"lt" => PointwiseOp::Lt,
		"le" => PointwiseOp::Le,
		"gt" => PointwiseOp::Gt,
		"ge" => PointwiseOp::Ge,
		"and" => PointwiseOp::And,
		"or" => PointwiseOp::Or,
		"not" => PointwiseOp::Not,
		"if" => PointwiseOp::If,
		other => {
			if let Some(rest) = other.strip_prefix("iftag@") {
				let mut parts = rest.split('@');
				let tag_true = parse_int(parts.next())?;
				let tag_false = parse_int(parts.next())?;
				PointwiseOp::IfTag {
					tag_true,
					tag_false,
				}
			} else if let Some(rest) = other.strip_prefix("ifdata@") {
				PointwiseOp::IfData {
					on_true: parse_int(Some(rest))? != 0,
				}
			} else if let Some(rest) = other.strip_prefix("istag@") {
				let matching =
					rest.split('@').map(|p| parse_int(Some(p))).collect::<Result<Vec<i64>>>()?;
				PointwiseOp::IsTag {
					matching,
				}
			} else {
				return Ok(None);
			}
		}
	}))
}

fn parse_int(part: Option<&str>) -> Result<i64> {
	part.and_then(|p| p.parse().ok()).ok_or_else(|| internal_error!("malformed kernel opcode"))
}

/// The element type of the stripe backing a schema: collections store
/// their leaves flat, so the dtype comes from the innermost items.
fn stripe_dtype(schema: &femtocode_type::Schema) -> Option<Dtype> {
	match schema {
		femtocode_type::Schema::Collection {
			items, ..
		} => stripe_dtype(items),
		other => other.dtype(),
	}
}

impl Op {
	pub fn compile(statement: &Statement, size_depths: &BTreeMap<ColumnName, usize>) -> Result<Op> {
		let dtype = statement.schema().and_then(stripe_dtype);
		match statement {
			Statement::Call {
				to,
				function,
				args,
				..
			} => {
				if let Some(op) = parse_pointwise(function)? {
					return Ok(Op::Pointwise {
						to: to.clone(),
						dtype: dtype
							.ok_or_else(|| internal_error!("call '{}' has no stripe dtype", to))?,
						op,
						args: args.clone(),
					});
				}
				if let Some(rest) = function.strip_prefix("getfixed@") {
					let stride = parse_int(Some(rest))? as usize;
					let [data, index] = args.as_slice() else {
						return Err(internal_error!("getfixed takes data and index"));
					};
					return Ok(Op::GetFixed {
						to: to.clone(),
						dtype: dtype
							.ok_or_else(|| internal_error!("call '{}' has no stripe dtype", to))?,
						data: data.clone(),
						index: index.clone(),
						stride,
					});
				}
				if let Some(rest) = function.strip_prefix("slicefixed@") {
					let mut parts = rest.split('@');
					let start = parse_int(parts.next())?;
					let step = parse_int(parts.next())?;
					let length = parse_int(parts.next())? as usize;
					let stride = parse_int(parts.next())? as usize;
					let [data] = args.as_slice() else {
						return Err(internal_error!("slicefixed takes one data column"));
					};
					let item = match statement.schema() {
						Some(femtocode_type::Schema::Collection {
							items, ..
						}) => items.dtype(),
						_ => None,
					};
					return Ok(Op::SliceFixed {
						to: to.clone(),
						dtype: item
							.ok_or_else(|| internal_error!("slice '{}' has no stripe dtype", to))?,
						data: data.clone(),
						start,
						step,
						length,
						stride,
					});
				}
				Err(internal_error!("unknown kernel function '{}'", function))
			}
			Statement::Explode {
				to,
				data,
				tosize,
				..
			} => Ok(Op::Explode {
				to: to.clone(),
				dtype: dtype.ok_or_else(|| internal_error!("explode '{}' has no stripe dtype", to))?,
				data: data.clone(),
				tosize: tosize.clone(),
				depth: *size_depths
					.get(tosize)
					.ok_or_else(|| internal_error!("size column '{}' has no recorded depth", tosize))?,
			}),
			Statement::ExplodeSize {
				to,
				sizes,
			} => Ok(Op::ExplodeSize {
				to: to.clone(),
				sizes: sizes.clone(),
			}),
			Statement::ExplodeData {
				to,
				data,
				fromsize,
				tosizes,
				..
			} => Ok(Op::ExplodeData {
				to: to.clone(),
				dtype: dtype.ok_or_else(|| internal_error!("explode '{}' has no stripe dtype", to))?,
				data: data.clone(),
				fromsize: fromsize.clone(),
				tosizes: tosizes.clone(),
			}),
			Statement::Literal {
				..
			}
			| Statement::Ref {
				..
			} => Err(internal_error!("literals and refs do not compile to kernel ops")),
		}
	}

	pub fn is_pointwise(&self) -> bool {
		matches!(self, Op::Pointwise { .. })
	}

	pub fn to(&self) -> &ColumnName {
		match self {
			Op::Pointwise {
				to, ..
			}
			| Op::Explode {
				to, ..
			}
			| Op::ExplodeSize {
				to, ..
			}
			| Op::ExplodeData {
				to, ..
			}
			| Op::GetFixed {
				to, ..
			}
			| Op::SliceFixed {
				to, ..
			} => to,
		}
	}

	pub fn execute(
		&self,
		workspace: &Workspace<'_>,
		num_entries: usize,
		imax: Option<usize>,
	) -> Result<(ColumnName, ArrayBuffer)> {
		match self {
			Op::Pointwise {
				to,
				dtype,
				op,
				args,
			} => {
				let imax =
					imax.ok_or_else(|| internal_error!("pointwise op before loop length known"))?;
				let views: Vec<_> = args.iter().map(|a| workspace.view(a)).collect::<Result<_>>()?;
				let buffer = run_pointwise(op, *dtype, &views, imax)?;
				Ok((to.clone(), buffer))
			}

			Op::Explode {
				to,
				dtype,
				data,
				tosize,
				depth,
			} => {
				let sizes = workspace.view(tosize)?;
				let source = workspace.view(data)?;
				let mut walker = EntryWalker::new(sizes.ints()?, *depth);
				let buffer = match dtype {
					Dtype::Float64 => {
						let mut out = Vec::new();
						let mut entry = 0usize;
						while let Some(leaves) = walker.next_entry()? {
							let value = source.f64_at(entry.min(scalar_cap(&source, entry)))?;
							out.extend(std::iter::repeat_n(value, leaves as usize));
							entry += 1;
						}
						ArrayBuffer::Float(out)
					}
					_ => {
						let mut out = Vec::new();
						let mut entry = 0usize;
						while let Some(leaves) = walker.next_entry()? {
							let value = source.i64_at(entry.min(scalar_cap(&source, entry)))?;
							out.extend(std::iter::repeat_n(value, leaves as usize));
							entry += 1;
						}
						ArrayBuffer::Int(out)
					}
				};
				Ok((to.clone(), buffer))
			}

			Op::ExplodeSize {
				to,
				sizes,
			} => {
				let (arrays, levels) = resolve_levels(workspace, sizes)?;
				let product = SizeProduct {
					arrays,
					levels,
				};
				Ok((to.clone(), ArrayBuffer::Int(product.combine()?)))
			}

			Op::ExplodeData {
				to,
				dtype,
				data,
				fromsize,
				tosizes,
			} => {
				let (arrays, levels) = resolve_levels(workspace, tosizes)?;
				let source = tosizes
					.iter()
					.position(|c| c == fromsize)
					.map(|at| levels[at])
					.ok_or_else(|| internal_error!("'{}' is not a level of its target shape", fromsize))?;
				let explode = DataExplode {
					arrays,
					levels,
					source,
				};
				let buffer = match (dtype, workspace.view(data)?) {
					(Dtype::Float64, view) => {
						let values = collect_f64(&view)?;
						let mut out = Vec::new();
						explode.combine(&values, &mut out)?;
						ArrayBuffer::Float(out)
					}
					(_, view) => {
						let values = collect_i64(&view)?;
						let mut out = Vec::new();
						explode.combine(&values, &mut out)?;
						ArrayBuffer::Int(out)
					}
				};
				Ok((to.clone(), buffer))
			}

			Op::GetFixed {
				to,
				dtype,
				data,
				index,
				stride,
			} => {
				let source = workspace.view(data)?;
				let indexes = workspace.view(index)?;
				let buffer = match dtype {
					Dtype::Float64 => {
						let mut out = Vec::with_capacity(num_entries);
						for entry in 0..num_entries {
							let at = indexes.i64_at(entry)? as usize;
							out.push(source.f64_at(entry * stride + at)?);
						}
						ArrayBuffer::Float(out)
					}
					_ => {
						let mut out = Vec::with_capacity(num_entries);
						for entry in 0..num_entries {
							let at = indexes.i64_at(entry)? as usize;
							out.push(source.i64_at(entry * stride + at)?);
						}
						ArrayBuffer::Int(out)
					}
				};
				Ok((to.clone(), buffer))
			}

			Op::SliceFixed {
				to,
				dtype,
				data,
				start,
				step,
				length,
				stride,
			} => {
				let source = workspace.view(data)?;
				let slot = |entry: usize, j: usize| -> usize {
					entry * stride + (*start + (j as i64) * *step) as usize
				};
				let buffer = match dtype {
					Dtype::Float64 => {
						let mut out = Vec::with_capacity(num_entries * length);
						for entry in 0..num_entries {
							for j in 0..*length {
								out.push(source.f64_at(slot(entry, j))?);
							}
						}
						ArrayBuffer::Float(out)
					}
					_ => {
						let mut out = Vec::with_capacity(num_entries * length);
						for entry in 0..num_entries {
							for j in 0..*length {
								out.push(source.i64_at(slot(entry, j))?);
							}
						}
						ArrayBuffer::Int(out)
					}
				};
				Ok((to.clone(), buffer))
			}
		}
	}
}

/// Scalar views ignore the entry index; arrays use it as-is.
fn scalar_cap(view: &super::View<'_>, entry: usize) -> usize {
	match view.len() {
		Some(_) => entry,
		None => 0,
	}
}

fn resolve_levels<'a>(
	workspace: &'a Workspace<'_>,
	columns: &[ColumnName],
) -> Result<(Vec<&'a [i64]>, Vec<usize>)> {
	let mut distinct: Vec<&ColumnName> = Vec::new();
	let mut levels = Vec::with_capacity(columns.len());
	for column in columns {
		let at = match distinct.iter().position(|c| *c == column) {
			Some(at) => at,
			None => {
				distinct.push(column);
				distinct.len() - 1
			}
		};
		levels.push(at);
	}
	let arrays: Vec<&[i64]> =
		distinct.iter().map(|c| workspace.view(c).and_then(|v| v.ints())).collect::<Result<_>>()?;
	Ok((arrays, levels))
}

fn collect_f64(view: &super::View<'_>) -> Result<Vec<f64>> {
	let length = view.len().ok_or_else(|| internal_error!("cannot explode a bare scalar"))?;
	(0..length).map(|i| view.f64_at(i)).collect()
}

fn collect_i64(view: &super::View<'_>) -> Result<Vec<i64>> {
	let length = view.len().ok_or_else(|| internal_error!("cannot explode a bare scalar"))?;
	(0..length).map(|i| view.i64_at(i)).collect()
}

fn python_floordiv_i64(a: i64, b: i64) -> Result<i64> {
	if b == 0 {
		return Err(execution_failure("integer division by zero".to_string()));
	}
	let q = a.wrapping_div(b);
	let r = a.wrapping_sub(q.wrapping_mul(b));
	Ok(if r != 0 && ((r < 0) != (b < 0)) { q - 1 } else { q })
}

fn python_mod_i64(a: i64, b: i64) -> Result<i64> {
	if b == 0 {
		return Err(execution_failure("integer modulo by zero".to_string()));
	}
	let r = a.wrapping_rem(b);
	Ok(if r != 0 && ((r < 0) != (b < 0)) { r.wrapping_add(b) } else { r })
}

fn run_pointwise(
	op: &PointwiseOp,
	dtype: Dtype,
	views: &[super::View<'_>],
	imax: usize,
) -> Result<ArrayBuffer> {
	let arg = |at: usize| -> Result<&super::View<'_>> {
		views.get(at).ok_or_else(|| internal_error!("kernel op missing argument {}", at))
	};

	// comparisons and logic always produce integer (boolean) stripes
	if let PointwiseOp::Eq
	| PointwiseOp::Ne
	| PointwiseOp::Lt
	| PointwiseOp::Le
	| PointwiseOp::Gt
	| PointwiseOp::Ge = op
	{
		let a = arg(0)?;
		let b = arg(1)?;
		let mut out = Vec::with_capacity(imax);
		for i in 0..imax {
			let x = a.f64_at(i)?;
			let y = b.f64_at(i)?;
			out.push(match op {
				PointwiseOp::Eq => (x == y) as i64,
				PointwiseOp::Ne => (x != y) as i64,
				PointwiseOp::Lt => (x < y) as i64,
				PointwiseOp::Le => (x <= y) as i64,
				PointwiseOp::Gt => (x > y) as i64,
				PointwiseOp::Ge => (x >= y) as i64,
				_ => unreachable!(),
			});
		}
		return Ok(ArrayBuffer::Int(out));
	}

	match op {
		PointwiseOp::And | PointwiseOp::Or => {
			let a = arg(0)?;
			let b = arg(1)?;
			let mut out = Vec::with_capacity(imax);
			for i in 0..imax {
				let x = a.i64_at(i)? != 0;
				let y = b.i64_at(i)? != 0;
				out.push(if matches!(op, PointwiseOp::And) { (x && y) as i64 } else { (x || y) as i64 });
			}
			Ok(ArrayBuffer::Int(out))
		}
		PointwiseOp::Not => {
			let a = arg(0)?;
			let mut out = Vec::with_capacity(imax);
			for i in 0..imax {
				out.push((a.i64_at(i)? == 0) as i64);
			}
			Ok(ArrayBuffer::Int(out))
		}
		PointwiseOp::IfTag {
			tag_true,
			tag_false,
		} => {
			let predicate = arg(0)?;
			let mut out = Vec::with_capacity(imax);
			for i in 0..imax {
				out.push(if predicate.i64_at(i)? != 0 { *tag_true } else { *tag_false });
			}
			Ok(ArrayBuffer::Int(out))
		}
		PointwiseOp::IsTag {
			matching,
		} => {
			let tags = arg(0)?;
			let mut out = Vec::with_capacity(imax);
			for i in 0..imax {
				out.push(matching.contains(&tags.i64_at(i)?) as i64);
			}
			Ok(ArrayBuffer::Int(out))
		}
		PointwiseOp::If => {
			let predicate = arg(0)?;
			match dtype {
				Dtype::Float64 => {
					let mut out = Vec::with_capacity(imax);
					for i in 0..imax {
						let taken = predicate.i64_at(i)? != 0;
						out.push(if taken { arg(1)?.f64_at(i)? } else { arg(2)?.f64_at(i)? });
					}
					Ok(ArrayBuffer::Float(out))
				}
				_ => {
					let mut out = Vec::with_capacity(imax);
					for i in 0..imax {
						let taken = predicate.i64_at(i)? != 0;
						out.push(if taken { arg(1)?.i64_at(i)? } else { arg(2)?.i64_at(i)? });
					}
					Ok(ArrayBuffer::Int(out))
				}
			}
		}
		PointwiseOp::IfData {
			on_true,
		} => {
			// a union possibility column is dense: one slot per entry
			// whose tag selects it, matching the shredded layout the
			// assembler reads back
			let predicate = arg(0)?;
			match dtype {
				Dtype::Float64 => {
					let mut out = Vec::new();
					for i in 0..imax {
						if (predicate.i64_at(i)? != 0) == *on_true {
							out.push(arg(1)?.f64_at(i)?);
						}
					}
					Ok(ArrayBuffer::Float(out))
				}
				_ => {
					let mut out = Vec::new();
					for i in 0..imax {
						if (predicate.i64_at(i)? != 0) == *on_true {
							out.push(arg(1)?.i64_at(i)?);
						}
					}
					Ok(ArrayBuffer::Int(out))
				}
			}
		}
		PointwiseOp::UPlus | PointwiseOp::UMinus => {
			let a = arg(0)?;
			match dtype {
				Dtype::Float64 => {
					let mut out = Vec::with_capacity(imax);
					for i in 0..imax {
						let v = a.f64_at(i)?;
						out.push(if matches!(op, PointwiseOp::UMinus) { -v } else { v });
					}
					Ok(ArrayBuffer::Float(out))
				}
				_ => {
					let mut out = Vec::with_capacity(imax);
					for i in 0..imax {
						let v = a.i64_at(i)?;
						out.push(if matches!(op, PointwiseOp::UMinus) { v.wrapping_neg() } else { v });
					}
					Ok(ArrayBuffer::Int(out))
				}
			}
		}
		_ => {
			// the binary arithmetic family
			let a = arg(0)?;
			let b = arg(1)?;
			match dtype {
				Dtype::Float64 => {
					let mut out = Vec::with_capacity(imax);
					for i in 0..imax {
						let x = a.f64_at(i)?;
						let y = b.f64_at(i)?;
						out.push(match op {
							PointwiseOp::Add => x + y,
							PointwiseOp::Sub => x - y,
							PointwiseOp::Mul => x * y,
							PointwiseOp::Div => x / y,
							PointwiseOp::FloorDiv => (x / y).floor(),
							PointwiseOp::Mod => x - y * (x / y).floor(),
							PointwiseOp::Pow => x.powf(y),
							_ => return Err(internal_error!("op has no float kernel")),
						});
					}
					Ok(ArrayBuffer::Float(out))
				}
				_ => {
					let mut out = Vec::with_capacity(imax);
					for i in 0..imax {
						let x = a.i64_at(i)?;
						let y = b.i64_at(i)?;
						out.push(match op {
							PointwiseOp::Add => x.wrapping_add(y),
							PointwiseOp::Sub => x.wrapping_sub(y),
							PointwiseOp::Mul => x.wrapping_mul(y),
							PointwiseOp::FloorDiv => python_floordiv_i64(x, y)?,
							PointwiseOp::Mod => python_mod_i64(x, y)?,
							PointwiseOp::Pow => u32::try_from(y)
								.ok()
								.and_then(|e| x.checked_pow(e))
								.unwrap_or(i64::MAX),
							PointwiseOp::Div => {
								return Err(internal_error!("true division is never integer"));
							}
							_ => return Err(internal_error!("op has no integer kernel")),
						});
					}
					Ok(ArrayBuffer::Int(out))
				}
			}
		}
	}
}
